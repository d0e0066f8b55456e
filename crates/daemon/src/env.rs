// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Service version (from Cargo.toml plus build hash)
pub const SERVICE_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH"));

/// Resolve state directory: OLC_STATE_DIR > XDG_STATE_HOME/olc > ~/.local/state/olc
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("OLC_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("olc"));
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoStateDir)?;
    Ok(home.join(".local/state/olc"))
}

/// Deployment mode string (default "console").
pub fn deploy_mode() -> String {
    std::env::var("OLC_MODE").unwrap_or_else(|_| "console".to_string())
}

/// Optional path to a TOML config overriding compiled-in flag defaults.
pub fn config_file() -> Option<PathBuf> {
    std::env::var("OLC_CONFIG").ok().map(PathBuf::from)
}

/// TCP port for remote connections. When set, the daemon listens on this
/// port in addition to the Unix socket.
pub fn tcp_port() -> Option<u16> {
    std::env::var("OLC_TCP_PORT").ok().and_then(|s| s.parse::<u16>().ok())
}

/// Auth token for TCP connections. Required when `OLC_TCP_PORT` is set.
/// Validated in the Hello handshake for TCP connections.
pub fn auth_token() -> Option<String> {
    std::env::var("OLC_AUTH_TOKEN").ok().filter(|s| !s.is_empty())
}

/// Shutdown drain timeout (default 20s, configurable via `OLC_DRAIN_TIMEOUT_MS`).
pub fn drain_timeout() -> Duration {
    std::env::var("OLC_DRAIN_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(20))
}

/// Read a `u64` flag override from the environment.
pub fn flag_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse::<u64>().ok())
}

/// Read a string flag override from the environment.
pub fn flag_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}
