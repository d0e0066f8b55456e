// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: configuration, flags, startup, shutdown.

mod flags;
mod startup;

pub use flags::{DeployMode, Flags};
pub use startup::{cleanup_on_shutdown, startup, StartupResult};

use std::path::PathBuf;
use thiserror::Error;

/// Errors during daemon startup/shutdown.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("no usable state directory (set OLC_STATE_DIR or HOME)")]
    NoStateDir,

    #[error("another daemon holds the lock")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind {0}")]
    BindFailed(PathBuf, #[source] std::io::Error),

    #[error("config file error: {0}")]
    BadConfig(String),

    #[error("cache initialization failed: {0}")]
    CacheInit(#[from] olc_cache::CacheError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Resolved daemon configuration: paths plus the effective flag set.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: DeployMode,
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub version_path: PathBuf,
    pub log_path: PathBuf,
    /// Per-session output blobs land under here.
    pub output_dir: PathBuf,
    pub cache_root: PathBuf,
    pub tcp_port: Option<u16>,
    pub flags: Flags,
}

impl Config {
    /// Load configuration: compiled-in defaults for the deployment mode,
    /// overridden by the optional TOML file, overridden by `OLC_*` env.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = crate::env::state_dir()?;
        let mode = DeployMode::parse(&crate::env::deploy_mode());

        let mut flags = Flags::defaults_for(mode);
        if let Some(path) = crate::env::config_file() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| LifecycleError::BadConfig(format!("{}: {e}", path.display())))?;
            flags.apply_toml(&text).map_err(LifecycleError::BadConfig)?;
        }
        flags.apply_env();

        let cache_root = flags
            .cache_root
            .clone()
            .unwrap_or_else(|| state_dir.join("cache"));

        Ok(Self {
            mode,
            socket_path: state_dir.join("olcd.sock"),
            lock_path: state_dir.join("olcd.lock"),
            version_path: state_dir.join("olcd.version"),
            log_path: state_dir.join("logs/daemon.log"),
            output_dir: state_dir.join("sessions"),
            cache_root,
            tcp_port: crate::env::tcp_port(),
            state_dir,
            flags,
        })
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
