// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
#[serial_test::serial]
fn config_paths_derive_from_state_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("OLC_STATE_DIR", dir.path());
    std::env::remove_var("OLC_CONFIG");
    std::env::remove_var("OLC_MODE");

    let config = Config::load().unwrap();
    std::env::remove_var("OLC_STATE_DIR");

    assert_eq!(config.state_dir, dir.path());
    assert_eq!(config.socket_path, dir.path().join("olcd.sock"));
    assert_eq!(config.lock_path, dir.path().join("olcd.lock"));
    assert_eq!(config.cache_root, dir.path().join("cache"));
    assert_eq!(config.mode, DeployMode::Console);
}

#[test]
#[serial_test::serial]
fn config_file_overrides_flags() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("olc.toml");
    std::fs::write(&file, "max_running_sessions = 3\n").unwrap();

    std::env::set_var("OLC_STATE_DIR", dir.path());
    std::env::set_var("OLC_CONFIG", &file);
    std::env::remove_var("OLC_MODE");

    let config = Config::load().unwrap();
    std::env::remove_var("OLC_STATE_DIR");
    std::env::remove_var("OLC_CONFIG");

    assert_eq!(config.flags.max_running_sessions, 3);
}

#[test]
#[serial_test::serial]
fn missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("OLC_STATE_DIR", dir.path());
    std::env::set_var("OLC_CONFIG", dir.path().join("nope.toml"));

    let err = Config::load().unwrap_err();
    std::env::remove_var("OLC_STATE_DIR");
    std::env::remove_var("OLC_CONFIG");

    assert!(matches!(err, LifecycleError::BadConfig(_)));
}

#[test]
#[serial_test::serial]
fn cache_root_flag_overrides_default_location() {
    let dir = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    std::env::set_var("OLC_STATE_DIR", dir.path());
    std::env::set_var("OLC_CACHE_ROOT", cache.path());
    std::env::remove_var("OLC_CONFIG");

    let config = Config::load().unwrap();
    std::env::remove_var("OLC_STATE_DIR");
    std::env::remove_var("OLC_CACHE_ROOT");

    assert_eq!(config.cache_root, cache.path());
}
