// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OLC Daemon (olcd)
//!
//! Long-running orchestration service for device test execution.
//!
//! Architecture:
//! - Listener task: socket I/O, framed request/response + log streaming
//! - Session manager: one dispatcher task per session, plugin events in
//!   strict order
//! - Device manager + scheduler: detection loop feeding a single-consumer
//!   allocation matcher

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;
use std::time::Duration;

use olc_core::SystemClock;
use olc_daemon::env::SERVICE_VERSION;
use olc_daemon::lifecycle::{self, Config, LifecycleError};
use olc_daemon::listener::{ListenCtx, Listener, SetLogLevelFn};
use olc_daemon::logmgr::LogManager;
use olc_daemon::session::{
    PluginRegistry, SessionManager, SessionManagerConfig, SessionManagerDeps,
};
use olc_device::{
    spawn_loops, spawn_scheduler, DeviceManager, FakeDispatcher, StandardStateChecker,
    StaticDetector,
};
use olc_engine::DriverRegistry;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Exit code for a fatal startup error.
const EXIT_STARTUP_FAILURE: i32 = 1;
/// Exit code for an unhandled panic after the hook fires.
const EXIT_PANIC: i32 = 2;

#[tokio::main]
async fn main() {
    // Handle info flags before any config/lock acquisition
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("olcd {SERVICE_VERSION}");
                return;
            }
            "--help" | "-h" | "help" => {
                println!("olcd {SERVICE_VERSION}");
                println!("OLC Daemon - long-running orchestration service for device tests");
                println!();
                println!("USAGE:");
                println!("    olcd");
                println!();
                println!("The daemon listens on a Unix socket for framed requests; runtime");
                println!("knobs come from compiled-in defaults, an optional TOML file");
                println!("(OLC_CONFIG), and OLC_* environment variables.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return;
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: olcd [--help | --version]");
                std::process::exit(EXIT_STARTUP_FAILURE);
            }
        }
    }

    // Unhandled panics must not leave a half-alive daemon behind.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        std::process::exit(EXIT_PANIC);
    }));

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(EXIT_STARTUP_FAILURE);
        }
    };

    rotate_log_if_needed(&config.log_path);
    if let Err(e) = write_startup_marker(&config) {
        eprintln!("Failed to write startup marker: {e}");
        std::process::exit(EXIT_STARTUP_FAILURE);
    }

    let (log_guard, set_log_level) = match setup_logging(&config) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("Failed to set up logging: {e}");
            std::process::exit(EXIT_STARTUP_FAILURE);
        }
    };

    info!("Starting olcd (mode: {})", config.mode);

    let startup = match lifecycle::startup(&config).await {
        Ok(result) => result,
        Err(LifecycleError::LockFailed(_)) => {
            // Another daemon is already running — print a human-readable
            // message instead of a raw debug error.
            let pid = std::fs::read_to_string(&config.lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            let version = std::fs::read_to_string(&config.version_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("olcd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            if !version.is_empty() {
                if version == SERVICE_VERSION {
                    eprintln!("  version: {version}");
                } else {
                    eprintln!("  version: {version} (outdated — current: {SERVICE_VERSION})");
                }
            }
            std::process::exit(EXIT_STARTUP_FAILURE);
        }
        Err(e) => {
            write_startup_error(&config, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            std::process::exit(EXIT_STARTUP_FAILURE);
        }
    };
    // Held for the process lifetime; the lock releases when it drops.
    let _lock_file = startup.lock_file;
    // Cache is constructed at startup so lock-less filesystems fail fast;
    // drivers capture it from here when they need staged inputs.
    let _cache = startup.cache;

    let cancel = CancellationToken::new();
    let clock = SystemClock;

    // Device manager: detection probes and dispatchers are composed here.
    // Real transports register their own; the static pair serves local
    // bring-up.
    let devices = Arc::new(DeviceManager::new(
        vec![Arc::new(StaticDetector::new()) as Arc<dyn olc_device::Detector>],
        vec![Arc::new(FakeDispatcher::new("android_real")) as Arc<dyn olc_device::Dispatcher>],
        Arc::new(StandardStateChecker),
        clock.clone(),
    ));
    let _device_loops = spawn_loops(
        Arc::clone(&devices),
        Duration::from_millis(config.flags.device_detect_interval_ms),
        Duration::from_millis(config.flags.device_check_interval_ms),
        cancel.clone(),
    );

    let (scheduler, _scheduler_task) =
        spawn_scheduler(Arc::clone(&devices), clock.clone(), cancel.clone());

    let (logs, _log_task) = LogManager::spawn(
        config.flags.log_buffer_capacity,
        config.flags.log_lag_threshold,
        cancel.clone(),
    );

    let sessions = SessionManager::new(SessionManagerDeps {
        plugins: PluginRegistry::builtin(),
        drivers: Arc::new(DriverRegistry::builtin()),
        scheduler,
        devices: Arc::clone(&devices),
        clock: clock.clone(),
        config: SessionManagerConfig {
            retention: Duration::from_millis(config.flags.session_retention_ms),
            max_running: config.flags.max_running_sessions,
            output_dir: config.output_dir.clone(),
        },
        logs: Some(logs.clone()),
        test_done_tx: None,
        cancel: cancel.clone(),
    });
    let _reaper = sessions.spawn_reaper(Duration::from_secs(60));

    if let Some(endpoint) = &config.flags.master_endpoint {
        // The master transport is deployment-specific and injected by the
        // build that has one; a bare olcd runs standalone.
        warn!(endpoint = %endpoint, "master endpoint configured but no client transport compiled in");
    }

    let shutdown_notify = Arc::new(Notify::new());
    let ctx = Arc::new(ListenCtx {
        sessions: sessions.clone(),
        devices: Arc::clone(&devices),
        logs,
        auth_token: olc_daemon::env::auth_token(),
        set_log_level: Some(set_log_level),
        shutdown: Arc::clone(&shutdown_notify),
        cancel: cancel.clone(),
    });

    let listener = match config.tcp_port {
        Some(port) => {
            match tokio::net::TcpListener::bind(("127.0.0.1", port)).await {
                Ok(tcp) => Listener::with_tcp(startup.listener, tcp, ctx),
                Err(e) => {
                    error!("Failed to bind TCP port {port}: {e}");
                    std::process::exit(EXIT_STARTUP_FAILURE);
                }
            }
        }
        None => Listener::new(startup.listener, ctx),
    };
    let _listener_task = tokio::spawn(listener.run());

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to install SIGTERM handler: {e}");
            std::process::exit(EXIT_STARTUP_FAILURE);
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to install SIGINT handler: {e}");
            std::process::exit(EXIT_STARTUP_FAILURE);
        }
    };

    info!("Daemon ready, listening on {}", config.socket_path.display());

    // Signal ready for parent process (e.g. systemd, CLI waiting for startup)
    println!("READY");

    tokio::select! {
        _ = shutdown_notify.notified() => info!("Shutdown requested via command"),
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
    }

    // Graceful shutdown: stop accepting, cancel work, drain sessions.
    cancel.cancel();
    sessions.drain(olc_daemon::env::drain_timeout()).await;
    lifecycle::cleanup_on_shutdown(&config);
    info!("Daemon stopped");
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (daemon.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `daemon.log` → `daemon.log.1` → `daemon.log.2` → `daemon.log.3`,
/// deleting the oldest. Best-effort: rotation failures are silently ignored
/// so the daemon still starts.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };

    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();

    // Shift older rotations: .3 is deleted, .2→.3, .1→.2
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    // Rotate current log → .1
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

/// Startup marker prefix written to log before anything else.
/// Operators use this to find where the current startup attempt begins.
/// Full format: "--- olcd: starting (pid: 12345) ---"
const STARTUP_MARKER_PREFIX: &str = "--- olcd: starting (pid: ";

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(config: &Config) -> Result<(), LifecycleError> {
    use std::io::Write;

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Append marker with PID, followed by a blank line so the marker and
    // any subsequent ERROR line appear on non-consecutive lines for
    // legibility when scanning the log.
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

/// Write a startup error synchronously to the log file.
/// This ensures the error is visible even if the process exits quickly.
fn write_startup_error(config: &Config, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(
    config: &Config,
) -> Result<(tracing_appender::non_blocking::WorkerGuard, SetLogLevelFn), LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // File appender; rotation happens at startup via rotate_log_if_needed
    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or(LifecycleError::NoStateDir)?,
        config.log_path.file_name().ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, reload_handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    let set_level: SetLogLevelFn = Arc::new(move |level: &str| {
        let parsed = EnvFilter::try_new(level).map_err(|e| e.to_string())?;
        reload_handle.reload(parsed).map_err(|e| e.to_string())
    });

    Ok((guard, set_level))
}
