// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the daemon.
//!
//! Every error that can cross a component boundary carries a stable numeric
//! [`ErrorId`], a human-readable message, and an optional cause chain. The
//! numeric ids are part of the wire contract and must never be renumbered.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable error identifiers.
///
/// The discriminants are serialized over the wire; add new kinds at the end,
/// never reuse a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorId {
    InvalidArgument,
    NotFound,
    PreconditionFailed,
    Timeout,
    Cancelled,
    AllocationAborted,
    DeviceLost,
    LoadFailure,
    ChecksumMismatch,
    IoFailure,
    VersionIncompatible,
    Internal,
}

impl ErrorId {
    /// The stable numeric code for this error kind.
    pub fn code(self) -> u32 {
        match self {
            ErrorId::InvalidArgument => 1001,
            ErrorId::NotFound => 1002,
            ErrorId::PreconditionFailed => 1003,
            ErrorId::Timeout => 1004,
            ErrorId::Cancelled => 1005,
            ErrorId::AllocationAborted => 1006,
            ErrorId::DeviceLost => 1007,
            ErrorId::LoadFailure => 1008,
            ErrorId::ChecksumMismatch => 1009,
            ErrorId::IoFailure => 1010,
            ErrorId::VersionIncompatible => 1011,
            ErrorId::Internal => 1012,
        }
    }

    /// Reverse lookup from a wire code. Unknown codes map to `Internal`.
    pub fn from_code(code: u32) -> Self {
        match code {
            1001 => ErrorId::InvalidArgument,
            1002 => ErrorId::NotFound,
            1003 => ErrorId::PreconditionFailed,
            1004 => ErrorId::Timeout,
            1005 => ErrorId::Cancelled,
            1006 => ErrorId::AllocationAborted,
            1007 => ErrorId::DeviceLost,
            1008 => ErrorId::LoadFailure,
            1009 => ErrorId::ChecksumMismatch,
            1010 => ErrorId::IoFailure,
            1011 => ErrorId::VersionIncompatible,
            _ => ErrorId::Internal,
        }
    }
}

crate::simple_display! {
    ErrorId {
        InvalidArgument => "INVALID_ARGUMENT",
        NotFound => "NOT_FOUND",
        PreconditionFailed => "PRECONDITION_FAILED",
        Timeout => "TIMEOUT",
        Cancelled => "CANCELLED",
        AllocationAborted => "ALLOCATION_ABORTED",
        DeviceLost => "DEVICE_LOST",
        LoadFailure => "LOAD_FAILURE",
        ChecksumMismatch => "CHECKSUM_MISMATCH",
        IoFailure => "IO_FAILURE",
        VersionIncompatible => "VERSION_INCOMPATIBLE",
        Internal => "INTERNAL",
    }
}

/// An error with a stable id, message, and optional cause chain.
#[derive(Debug, Error)]
#[error("{} ({}): {}", id, id.code(), message)]
pub struct InfraError {
    id: ErrorId,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl InfraError {
    pub fn new(id: ErrorId, message: impl Into<String>) -> Self {
        Self { id, message: message.into(), source: None }
    }

    pub fn with_source(
        id: ErrorId,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self { id, message: message.into(), source: Some(Box::new(source)) }
    }

    pub fn id(&self) -> ErrorId {
        self.id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Cause messages from outermost to innermost, excluding this error.
    pub fn cause_chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut cause: Option<&(dyn std::error::Error + 'static)> =
            self.source.as_deref().map(|e| e as _);
        while let Some(e) = cause {
            chain.push(e.to_string());
            cause = e.source();
        }
        chain
    }
}

impl From<std::io::Error> for InfraError {
    fn from(e: std::io::Error) -> Self {
        InfraError::with_source(ErrorId::IoFailure, "io error", e)
    }
}

/// Serializable snapshot of an [`InfraError`].
///
/// This is the form stored on session/test records and sent over the wire.
/// The cause chain is lossy: messages only, reconstructed client-side as a
/// flat list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: ErrorId,
    pub code: u32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl ErrorRecord {
    pub fn new(id: ErrorId, message: impl Into<String>) -> Self {
        Self { id, code: id.code(), message: message.into(), causes: Vec::new() }
    }
}

impl From<&InfraError> for ErrorRecord {
    fn from(e: &InfraError) -> Self {
        Self {
            id: e.id(),
            code: e.id().code(),
            message: e.message().to_string(),
            causes: e.cause_chain(),
        }
    }
}

impl From<InfraError> for ErrorRecord {
    fn from(e: InfraError) -> Self {
        ErrorRecord::from(&e)
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.id, self.code, self.message)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
