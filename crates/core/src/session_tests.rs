// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::strategies::*;
use proptest::prelude::*;

#[test]
fn generated_ids_are_distinct_uuids() {
    let a = SessionId::generate();
    let b = SessionId::generate();
    assert_ne!(a, b);
    assert_eq!(a.as_str().len(), 36);
}

#[test]
fn session_id_borrow_and_eq_str() {
    let id = SessionId::new("abc");
    assert_eq!(id, "abc");
    assert_eq!(id.to_string(), "abc");
}

#[yare::parameterized(
    submitted_to_starting   = { SessionState::Submitted, SessionState::Starting, true },
    starting_to_running     = { SessionState::Starting, SessionState::Running, true },
    running_to_finished     = { SessionState::Running, SessionState::Finished { result: SessionResult::Completed }, true },
    starting_to_finished    = { SessionState::Starting, SessionState::Finished { result: SessionResult::Error }, true },
    submitted_to_finished   = { SessionState::Submitted, SessionState::Finished { result: SessionResult::Cancelled }, true },
    running_to_starting     = { SessionState::Running, SessionState::Starting, false },
    finished_to_running     = { SessionState::Finished { result: SessionResult::Completed }, SessionState::Running, false },
    submitted_to_running    = { SessionState::Submitted, SessionState::Running, false },
)]
fn state_transitions(from: SessionState, to: SessionState, allowed: bool) {
    assert_eq!(from.can_advance_to(&to), allowed);
}

#[test]
fn finished_is_terminal() {
    assert!(SessionState::Finished { result: SessionResult::Completed }.is_finished());
    assert!(!SessionState::Running.is_finished());
}

#[test]
fn detail_starts_submitted_and_empty() {
    let detail = SessionDetail::new(SessionId::generate(), "smoke", 1_000);
    assert_eq!(detail.state, SessionState::Submitted);
    assert!(detail.outputs.is_empty());
    assert!(detail.error.is_none());
    assert!(detail.job_ids.is_empty());
}

#[test]
fn config_serde_defaults_missing_fields() {
    let config: SessionConfig = serde_json::from_str("{}").unwrap();
    assert!(config.plugins.is_empty());
    assert!(config.metadata.is_empty());
}

#[test]
fn plugin_spec_defaults_to_null_config() {
    let spec = PluginSpec::new("result-collector");
    assert_eq!(spec.config, serde_json::Value::Null);
}

#[test]
fn detail_serde_round_trip() {
    let mut detail = SessionDetail::new(SessionId::new("s-1"), "smoke", 1_000);
    detail.outputs.insert("report".to_string(), serde_json::json!({"passed": 3}));
    detail.state = SessionState::Finished { result: SessionResult::Completed };

    let json = serde_json::to_string(&detail).unwrap();
    let parsed: SessionDetail = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, detail);
}

proptest! {
    #[test]
    fn session_state_serde_roundtrip(state in arb_session_state()) {
        let json = serde_json::to_string(&state).unwrap();
        let parsed: SessionState = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(state, parsed);
    }
}
