// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional sync with an external master.
//!
//! When configured, a periodic task signs the lab up, heartbeats the
//! current device snapshot, reports finished tests, and force-evicts jobs
//! the master has considered dead for longer than the extra-time window.
//! Everything in the daemon works with this disabled.

use crate::session::SessionManager;
use async_trait::async_trait;
use olc_core::{Clock, DeviceInfo, InfraError, JobId, TestId};
use olc_device::DeviceManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Client for the external master service.
#[async_trait]
pub trait MasterClient: Send + Sync {
    async fn sign_up(&self, devices: &[DeviceInfo]) -> Result<(), InfraError>;

    async fn heartbeat(&self, devices: &[DeviceInfo]) -> Result<(), InfraError>;

    async fn close_test(&self, test_id: &TestId) -> Result<(), InfraError>;

    /// Which of `job_ids` the master still considers alive.
    async fn alive_jobs(&self, job_ids: &[JobId]) -> Result<Vec<JobId>, InfraError>;
}

/// Tuning for the sync loop.
#[derive(Debug, Clone)]
pub struct MasterSyncConfig {
    pub heartbeat_interval: Duration,
    /// How long a job may stay master-dead before forced eviction.
    pub dead_job_extra_time: Duration,
}

impl Default for MasterSyncConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(10),
            dead_job_extra_time: Duration::from_secs(60),
        }
    }
}

/// Spawn the master sync loop.
///
/// `test_done_rx` receives ids of finished tests from the session manager.
pub fn spawn_master_sync<C: Clock + 'static>(
    client: Arc<dyn MasterClient>,
    devices: Arc<DeviceManager<C>>,
    sessions: SessionManager<C>,
    clock: C,
    config: MasterSyncConfig,
    mut test_done_rx: mpsc::Receiver<TestId>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut signed_up = false;
        // Job id → first time the master reported it dead.
        let mut dead_since: HashMap<JobId, u64> = HashMap::new();
        let mut tick = tokio::time::interval(config.heartbeat_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                Some(test_id) = test_done_rx.recv() => {
                    if let Err(e) = client.close_test(&test_id).await {
                        warn!(test = %test_id, error = %e, "close_test failed");
                    }
                    continue;
                }
                _ = tick.tick() => {}
            }

            let snapshot = devices.snapshot();
            if !signed_up {
                match client.sign_up(&snapshot).await {
                    Ok(()) => {
                        info!(devices = snapshot.len(), "signed up with master");
                        signed_up = true;
                    }
                    Err(e) => {
                        warn!(error = %e, "master sign-up failed, will retry");
                        continue;
                    }
                }
            } else if let Err(e) = client.heartbeat(&snapshot).await {
                warn!(error = %e, "master heartbeat failed");
                continue;
            }

            // Jobs the master no longer acknowledges get a grace window,
            // then are evicted locally.
            let local = sessions.running_job_ids();
            if local.is_empty() {
                dead_since.clear();
                continue;
            }
            let alive = match client.alive_jobs(&local).await {
                Ok(alive) => alive,
                Err(e) => {
                    warn!(error = %e, "alive_jobs poll failed");
                    continue;
                }
            };
            let now = clock.epoch_ms();
            let extra_ms = config.dead_job_extra_time.as_millis() as u64;
            dead_since.retain(|job_id, _| local.contains(job_id));
            for job_id in &local {
                if alive.contains(job_id) {
                    dead_since.remove(job_id);
                    continue;
                }
                let since = *dead_since.entry(*job_id).or_insert(now);
                if now.saturating_sub(since) > extra_ms {
                    warn!(job = %job_id, "master reports job dead past grace window");
                    sessions.evict_job(job_id);
                    dead_since.remove(job_id);
                }
            }
            debug!(local = local.len(), alive = alive.len(), "master sync pass");
        }
        debug!("master sync stopped");
    })
}

#[cfg(test)]
#[path = "master_tests.rs"]
mod tests;
