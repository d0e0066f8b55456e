// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identity, configuration, and lifecycle state.
//!
//! A session is the unit of user-visible work: created over the wire,
//! expanded into jobs by its plugins, and queryable until it is reaped.

use crate::error::ErrorRecord;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;

/// Unique identifier for a session.
///
/// Sessions are identified by a UUID assigned at creation time; the id is
/// the only handle clients ever hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a fresh random session id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Create a SessionId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for SessionId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SessionId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Terminal outcome of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionResult {
    Completed,
    Error,
    Cancelled,
}

crate::simple_display! {
    SessionResult {
        Completed => "completed",
        Error => "error",
        Cancelled => "cancelled",
    }
}

/// Lifecycle state of a session.
///
/// Transitions are strictly forward: `Submitted → Starting → Running →
/// Finished`. The state is only ever mutated on the session's dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Submitted,
    Starting,
    Running,
    Finished { result: SessionResult },
}

impl SessionState {
    pub fn is_finished(&self) -> bool {
        matches!(self, SessionState::Finished { .. })
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(&self, next: &SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Submitted, Starting)
                | (Starting, Running)
                | (Starting, Finished { .. })
                | (Running, Finished { .. })
                | (Submitted, Finished { .. })
        )
    }
}

crate::simple_display! {
    SessionState {
        Submitted => "submitted",
        Starting => "starting",
        Running => "running",
        Finished { .. } => "finished",
    }
}

/// One plugin activation inside a session: a registry label plus the opaque
/// configuration blob handed to the plugin at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub label: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl PluginSpec {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), config: serde_json::Value::Null }
    }

    pub fn with_config(label: impl Into<String>, config: serde_json::Value) -> Self {
        Self { label: label.into(), config }
    }
}

/// Immutable configuration a session is created with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionConfig {
    #[serde(default)]
    pub name: String,
    /// Plugins to load, in registration order.
    #[serde(default)]
    pub plugins: Vec<PluginSpec>,
    /// Free-form client metadata (client name, user, invocation context).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Mutable, queryable record of a session.
///
/// `outputs` maps a plugin-output type tag to an opaque payload; it is only
/// ever mutated through the session manager's CAS transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetail {
    pub id: SessionId,
    pub name: String,
    pub state: SessionState,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    /// Plugin-output type tag → opaque payload. Insertion-ordered so query
    /// responses are stable.
    #[serde(default)]
    pub outputs: IndexMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
    /// Ids of jobs the session's plugins registered.
    #[serde(default)]
    pub job_ids: Vec<crate::job::JobId>,
}

impl SessionDetail {
    pub fn new(id: SessionId, name: impl Into<String>, created_at_ms: u64) -> Self {
        Self {
            id,
            name: name.into(),
            state: SessionState::Submitted,
            created_at_ms,
            started_at_ms: None,
            ended_at_ms: None,
            outputs: IndexMap::new(),
            error: None,
            job_ids: Vec::new(),
        }
    }
}

/// Well-known notification payloads interpreted by the session manager
/// itself; anything else is opaque to the core and forwarded to plugins.
pub const CANCEL_SESSION: &str = "CANCEL_SESSION";
pub const HEARTBEAT_SESSION: &str = "HEARTBEAT_SESSION";

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
