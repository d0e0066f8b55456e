// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::fs::File;
use std::io::Write;

use tokio::net::UnixListener;
use tracing::info;

use super::{Config, LifecycleError};

/// Handles produced by a successful startup.
pub struct StartupResult {
    pub listener: UnixListener,
    /// Held for the daemon's lifetime; dropping it releases the lock.
    pub lock_file: File,
    /// Cache constructed eagerly so unsupported filesystems fail startup.
    pub cache: olc_cache::Cache,
}

/// Start the daemon: lock, directories, cache probe, socket bind.
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Don't clean up if we failed to acquire the lock —
            // those files belong to the already-running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    // 1. Create the state directory (needed for socket, lock, etc.)
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire the lock file FIRST - prevents races.
    // Use OpenOptions to avoid truncating the file before we hold the lock,
    // which would wipe the running daemon's PID.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    fs2::FileExt::try_lock_exclusive(&lock_file).map_err(LifecycleError::LockFailed)?;

    // Write PID to lock file (truncate now that we hold the lock)
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Create working directories
    std::fs::create_dir_all(&config.output_dir)?;
    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Write version file
    std::fs::write(&config.version_path, crate::env::SERVICE_VERSION)?;

    // 4. Open the persistent cache; this probes advisory lock support and
    // refuses to run on filesystems without it.
    let cache = olc_cache::Cache::new(&config.cache_root)?;
    info!(root = %config.cache_root.display(), "cache ready");

    // 5. Remove stale socket and bind (LAST - only after all validation passes)
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    info!(socket = %config.socket_path.display(), mode = %config.mode, "daemon listening");
    Ok(StartupResult { listener, lock_file, cache })
}

/// Remove files a failed startup may have left behind.
fn cleanup_on_failure(config: &Config) {
    let _ = std::fs::remove_file(&config.socket_path);
    let _ = std::fs::remove_file(&config.version_path);
}

/// Remove runtime files on graceful shutdown; the lock releases when the
/// held file handle drops.
pub fn cleanup_on_shutdown(config: &Config) {
    let _ = std::fs::remove_file(&config.socket_path);
    let _ = std::fs::remove_file(&config.version_path);
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
