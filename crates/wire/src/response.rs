// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Responses from the daemon to clients.

use crate::detail::SessionDetailDto;
use olc_core::{DeviceInfo, ErrorRecord, LogRecord, SessionId};
use serde::{Deserialize, Serialize};

/// Response to a [`crate::request::Request`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic acknowledgement.
    Ok,

    /// Handshake accepted.
    Hello {
        /// Service version.
        version: String,
    },

    /// Session created.
    SessionId { id: SessionId },

    /// One session's (possibly masked) detail.
    SessionDetail { detail: SessionDetailDto },

    /// All matching sessions.
    SessionList { sessions: Vec<SessionDetailDto> },

    /// One batch of streamed log records.
    LogBatch { records: Vec<LogRecord> },

    /// Current device population.
    DeviceList { devices: Vec<DeviceInfo> },

    /// Service version tuple.
    Version {
        version: String,
        /// Lowest client stub version this service accepts.
        min_client_version: String,
    },

    /// Request failed; the error carries its stable numeric id and a lossy
    /// cause chain.
    Error { error: ErrorRecord },
}

impl Response {
    /// Build an error response from any infra error.
    pub fn error(e: &olc_core::InfraError) -> Self {
        Response::Error { error: ErrorRecord::from(e) }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
