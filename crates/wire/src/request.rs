// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Requests from clients to the daemon.

use olc_core::{DeviceSelectionOptions, SessionConfig, SessionResult};
use serde::{Deserialize, Serialize};

/// Filter applied by `GetAllSessions`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionFilter {
    /// Match only sessions whose name contains this substring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_contains: Option<String>,
    /// Match only finished sessions with this result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<SessionResult>,
    /// Exclude finished sessions entirely.
    #[serde(default)]
    pub running_only: bool,
}

/// Request from a client to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Version handshake; must be the first frame on a connection.
    Hello {
        /// Client stub version.
        version: String,
        /// Lowest service version the client can talk to.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_service_version: Option<String>,
        /// Auth token for TCP connections (ignored for Unix socket).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },

    /// Create a session and return its id without waiting for it.
    CreateSession { config: SessionConfig },

    /// Create a session and block until it finishes (or the client
    /// deadline elapses).
    RunSession {
        config: SessionConfig,
        /// Client-side deadline in milliseconds; the server stops waiting
        /// (but not the session) when it passes.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deadline_ms: Option<u64>,
    },

    /// Fetch one session's detail, optionally trimmed by a field mask.
    GetSession {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field_mask: Option<Vec<String>>,
    },

    /// Fetch all sessions' details.
    GetAllSessions {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field_mask: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<SessionFilter>,
    },

    /// Deliver an opaque notification payload to a session's plugins.
    NotifySession { id: String, payload: String },

    /// Ack, then gracefully stop the server (20s drain).
    KillServer,

    /// Change the daemon log level at runtime.
    SetLogLevel { level: String },

    /// Liveness probe.
    Heartbeat,

    /// Open a log stream; the server pushes batches until the client
    /// closes the connection.
    GetLog {
        /// Drop records below this importance ("debug", "normal",
        /// "important").
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_importance: Option<String>,
    },

    /// Service version tuple.
    GetVersion,

    /// Snapshot of the device population, optionally filtered the same way
    /// the scheduler filters.
    GetDeviceInfos {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<DeviceSelectionOptions>,
    },
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
