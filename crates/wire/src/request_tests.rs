// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use olc_core::PluginSpec;

#[test]
fn requests_serialize_with_type_tag() {
    let json = serde_json::to_string(&Request::Heartbeat).unwrap();
    assert_eq!(json, r#"{"type":"Heartbeat"}"#);
}

#[test]
fn hello_omits_optional_fields() {
    let request = Request::Hello {
        version: "0.2.0".to_string(),
        min_service_version: None,
        token: None,
    };
    let json = serde_json::to_string(&request).unwrap();
    assert!(!json.contains("token"));
    assert!(!json.contains("min_service_version"));
}

#[test]
fn create_session_round_trips_config() {
    let mut config = SessionConfig::default();
    config.name = "smoke".to_string();
    config.plugins.push(PluginSpec::new("job-creator"));
    let request = Request::CreateSession { config: config.clone() };

    let json = serde_json::to_string(&request).unwrap();
    let parsed: Request = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, Request::CreateSession { config });
}

#[test]
fn get_session_defaults_mask_to_none() {
    let json = r#"{"type":"GetSession","id":"abc"}"#;
    let parsed: Request = serde_json::from_str(json).unwrap();
    assert_eq!(parsed, Request::GetSession { id: "abc".to_string(), field_mask: None });
}

#[test]
fn session_filter_defaults() {
    let filter: SessionFilter = serde_json::from_str("{}").unwrap();
    assert_eq!(filter, SessionFilter::default());
    assert!(!filter.running_only);
}

#[test]
fn notify_session_round_trip() {
    let request =
        Request::NotifySession { id: "s-1".to_string(), payload: "CANCEL_SESSION".to_string() };
    let json = serde_json::to_string(&request).unwrap();
    let parsed: Request = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, request);
}
