// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in runtime flags, keyed by deployment mode.
//!
//! The defaults table is part of the deployment contract: downstream
//! tooling keys off these exact names and values, so changes here must be
//! coordinated with the deployment manifests.

use serde::Deserialize;
use std::path::PathBuf;

/// How the daemon is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMode {
    /// Interactive local run.
    Console,
    /// Shared lab host.
    LabServer,
    /// Fleet deployment (any `omni-*` mode string).
    Omni,
}

impl DeployMode {
    /// Parse a mode string; unknown strings fall back to `Console`.
    pub fn parse(s: &str) -> Self {
        match s {
            "lab_server" | "lab" => DeployMode::LabServer,
            _ if s.starts_with("omni") => DeployMode::Omni,
            _ => DeployMode::Console,
        }
    }
}

olc_core::simple_display! {
    DeployMode {
        Console => "console",
        LabServer => "lab_server",
        Omni => "omni",
    }
}

/// Effective runtime knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct Flags {
    pub device_detect_interval_ms: u64,
    pub device_check_interval_ms: u64,
    pub session_retention_ms: u64,
    pub max_running_sessions: usize,
    pub log_buffer_capacity: usize,
    /// Full batches a log subscriber may fall behind before being dropped.
    pub log_lag_threshold: u32,
    pub master_endpoint: Option<String>,
    pub master_heartbeat_interval_ms: u64,
    pub master_dead_job_extra_ms: u64,
    pub cache_root: Option<PathBuf>,
    pub cache_retention_ms: u64,
}

/// TOML-facing view; every field optional so partial files work.
#[derive(Debug, Default, Deserialize)]
struct FlagsFile {
    device_detect_interval_ms: Option<u64>,
    device_check_interval_ms: Option<u64>,
    session_retention_ms: Option<u64>,
    max_running_sessions: Option<usize>,
    log_buffer_capacity: Option<usize>,
    log_lag_threshold: Option<u32>,
    master_endpoint: Option<String>,
    master_heartbeat_interval_ms: Option<u64>,
    master_dead_job_extra_ms: Option<u64>,
    cache_root: Option<PathBuf>,
    cache_retention_ms: Option<u64>,
}

impl Flags {
    /// The compiled-in defaults table.
    pub fn defaults_for(mode: DeployMode) -> Self {
        let base = Self {
            device_detect_interval_ms: 2_000,
            device_check_interval_ms: 60_000,
            session_retention_ms: 24 * 60 * 60 * 1_000,
            max_running_sessions: 30,
            log_buffer_capacity: 4_096,
            log_lag_threshold: 8,
            master_endpoint: None,
            master_heartbeat_interval_ms: 10_000,
            master_dead_job_extra_ms: 60_000,
            cache_root: None,
            cache_retention_ms: 7 * 24 * 60 * 60 * 1_000,
        };
        match mode {
            DeployMode::Console => Self {
                // Local runs keep less history and fewer parallel sessions.
                session_retention_ms: 60 * 60 * 1_000,
                max_running_sessions: 5,
                ..base
            },
            DeployMode::LabServer => base,
            DeployMode::Omni => Self { max_running_sessions: 60, ..base },
        }
    }

    /// Apply overrides from a TOML document.
    pub fn apply_toml(&mut self, text: &str) -> Result<(), String> {
        let file: FlagsFile = toml::from_str(text).map_err(|e| e.to_string())?;
        if let Some(v) = file.device_detect_interval_ms {
            self.device_detect_interval_ms = v;
        }
        if let Some(v) = file.device_check_interval_ms {
            self.device_check_interval_ms = v;
        }
        if let Some(v) = file.session_retention_ms {
            self.session_retention_ms = v;
        }
        if let Some(v) = file.max_running_sessions {
            self.max_running_sessions = v;
        }
        if let Some(v) = file.log_buffer_capacity {
            self.log_buffer_capacity = v;
        }
        if let Some(v) = file.log_lag_threshold {
            self.log_lag_threshold = v;
        }
        if let Some(v) = file.master_endpoint {
            self.master_endpoint = Some(v);
        }
        if let Some(v) = file.master_heartbeat_interval_ms {
            self.master_heartbeat_interval_ms = v;
        }
        if let Some(v) = file.master_dead_job_extra_ms {
            self.master_dead_job_extra_ms = v;
        }
        if let Some(v) = file.cache_root {
            self.cache_root = Some(v);
        }
        if let Some(v) = file.cache_retention_ms {
            self.cache_retention_ms = v;
        }
        Ok(())
    }

    /// Apply `OLC_*` environment overrides (highest precedence).
    pub fn apply_env(&mut self) {
        use crate::env::{flag_string, flag_u64};
        if let Some(v) = flag_u64("OLC_DEVICE_DETECT_INTERVAL_MS") {
            self.device_detect_interval_ms = v;
        }
        if let Some(v) = flag_u64("OLC_DEVICE_CHECK_INTERVAL_MS") {
            self.device_check_interval_ms = v;
        }
        if let Some(v) = flag_u64("OLC_SESSION_RETENTION_MS") {
            self.session_retention_ms = v;
        }
        if let Some(v) = flag_u64("OLC_MAX_RUNNING_SESSIONS") {
            self.max_running_sessions = v as usize;
        }
        if let Some(v) = flag_u64("OLC_LOG_BUFFER_CAPACITY") {
            self.log_buffer_capacity = v as usize;
        }
        if let Some(v) = flag_u64("OLC_LOG_LAG_THRESHOLD") {
            self.log_lag_threshold = v as u32;
        }
        if let Some(v) = flag_string("OLC_MASTER_ENDPOINT") {
            self.master_endpoint = Some(v);
        }
        if let Some(v) = flag_u64("OLC_MASTER_HEARTBEAT_INTERVAL_MS") {
            self.master_heartbeat_interval_ms = v;
        }
        if let Some(v) = flag_u64("OLC_MASTER_DEAD_JOB_EXTRA_MS") {
            self.master_dead_job_extra_ms = v;
        }
        if let Some(v) = flag_string("OLC_CACHE_ROOT") {
            self.cache_root = Some(PathBuf::from(v));
        }
        if let Some(v) = flag_u64("OLC_CACHE_RETENTION_MS") {
            self.cache_retention_ms = v;
        }
    }
}

#[cfg(test)]
#[path = "flags_tests.rs"]
mod tests;
