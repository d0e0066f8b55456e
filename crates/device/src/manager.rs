// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device manager: detection, dispatch, state tracking, change fan-out.
//!
//! Detectors are polled on a fixed interval; new serials run through the
//! dispatcher chain to become typed devices, each owned by a
//! [`DeviceRunner`]. Change events go out on a broadcast channel whose
//! receivers see drop-oldest semantics when they lag.

use crate::checker::{DeviceStateChecker, ReleaseDecision};
use crate::detector::Detector;
use crate::dispatcher::Dispatcher;
use crate::runner::DeviceRunner;
use olc_core::{
    matches, Clock, DeviceEvent, DeviceId, DeviceInfo, DeviceSelectionOptions, DeviceStatus,
};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capacity of the device-event broadcast channel. Receivers that fall
/// further behind lose the oldest events (`RecvError::Lagged`).
const EVENT_CAPACITY: usize = 256;

/// Tracks the live device population.
pub struct DeviceManager<C: Clock> {
    runners: RwLock<HashMap<DeviceId, Arc<DeviceRunner>>>,
    detectors: Vec<Arc<dyn Detector>>,
    dispatchers: Vec<Arc<dyn Dispatcher>>,
    checker: Arc<dyn DeviceStateChecker>,
    events: broadcast::Sender<DeviceEvent>,
    clock: C,
}

impl<C: Clock> DeviceManager<C> {
    pub fn new(
        detectors: Vec<Arc<dyn Detector>>,
        dispatchers: Vec<Arc<dyn Dispatcher>>,
        checker: Arc<dyn DeviceStateChecker>,
        clock: C,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { runners: RwLock::new(HashMap::new()), detectors, dispatchers, checker, events, clock }
    }

    /// Subscribe to device population changes.
    ///
    /// Events emitted before the subscription are not replayed; pair the
    /// stream with an initial [`Self::snapshot`].
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    /// Consistent snapshot of the full device set.
    pub fn snapshot(&self) -> Vec<DeviceInfo> {
        self.runners.read().values().map(|r| r.snapshot()).collect()
    }

    /// Synchronous filtered read of the device set.
    pub fn query(&self, filter: Option<&DeviceSelectionOptions>) -> Vec<DeviceInfo> {
        self.runners
            .read()
            .values()
            .map(|r| r.snapshot())
            .filter(|d| filter.is_none_or(|f| matches(d, f)))
            .collect()
    }

    pub fn runner(&self, id: &DeviceId) -> Option<Arc<DeviceRunner>> {
        self.runners.read().get(id).cloned()
    }

    pub fn device_count(&self) -> usize {
        self.runners.read().len()
    }

    /// Set a device's status and broadcast the change.
    pub fn set_status(&self, id: &DeviceId, status: DeviceStatus) {
        let Some(runner) = self.runner(id) else {
            warn!(device = %id, %status, "status change for unknown device");
            return;
        };
        if runner.set_status(status, self.clock.epoch_ms()) {
            self.emit(DeviceEvent::StatusChanged { id: id.clone(), status });
        }
    }

    /// Release a device after a test.
    ///
    /// Explicit dirty requests (reboot asked, timeout kill) and the state
    /// checker's verdict both force `Dirty`; otherwise the device returns
    /// to `Idle`. Returns the resulting status.
    pub fn release(&self, id: &DeviceId, explicit_dirty: bool) -> Option<DeviceStatus> {
        let runner = self.runner(id)?;
        let info = runner.snapshot();
        let decision = if explicit_dirty {
            ReleaseDecision::Dirty { reason: "dirty release requested".to_string() }
        } else {
            self.checker.check(&info)
        };
        let status = match decision {
            ReleaseDecision::Clean => DeviceStatus::Idle,
            ReleaseDecision::Dirty { reason } => {
                info!(device = %id, reason, "device released dirty");
                DeviceStatus::Dirty
            }
        };
        self.set_status(id, status);
        Some(status)
    }

    /// One detection pass: poll detectors, dispatch new serials, drop lost
    /// devices.
    pub async fn detect_once(&self) {
        let mut seen: HashSet<String> = HashSet::new();
        for detector in &self.detectors {
            match detector.detect().await {
                Ok(serials) => seen.extend(serials),
                Err(e) => warn!(detector = detector.name(), error = %e, "detector failed"),
            }
        }

        // Additions: dispatch serials we do not know yet.
        let known: HashSet<DeviceId> = self.runners.read().keys().cloned().collect();
        for serial in &seen {
            let id = DeviceId::new(serial.clone());
            if known.contains(&id) {
                continue;
            }
            match self.dispatch(serial).await {
                Some(device) => {
                    let id = device.control_id.clone();
                    let runner = Arc::new(DeviceRunner::new(device));
                    runner.bootstrap(self.clock.epoch_ms());
                    let snapshot = runner.snapshot();
                    self.runners.write().insert(id.clone(), runner);
                    info!(device = %id, "device up");
                    self.emit(DeviceEvent::Up { device: snapshot });
                }
                None => debug!(serial, "no dispatcher claimed serial"),
            }
        }

        // Removals: known devices whose serial is gone. Busy devices stay
        // tracked as Missing until their allocation releases them.
        let lost: Vec<(DeviceId, Arc<DeviceRunner>)> = {
            let runners = self.runners.read();
            runners
                .iter()
                .filter(|(_, r)| !seen.contains(&r.serial()))
                .map(|(id, r)| (id.clone(), Arc::clone(r)))
                .collect()
        };
        for (id, runner) in lost {
            if runner.status() == DeviceStatus::Busy {
                if runner.set_status(DeviceStatus::Missing, self.clock.epoch_ms()) {
                    warn!(device = %id, "busy device went missing");
                    self.emit(DeviceEvent::StatusChanged {
                        id,
                        status: DeviceStatus::Missing,
                    });
                }
            } else {
                self.runners.write().remove(&id);
                info!(device = %id, "device down");
                self.emit(DeviceEvent::Down { id });
            }
        }
    }

    /// One recovery pass: bring `Dirty` devices back to `Idle`.
    ///
    /// Stand-in for the reboot/cleanup a production device type performs;
    /// runs on the device-check interval.
    pub fn check_once(&self) {
        let dirty: Vec<DeviceId> = {
            let runners = self.runners.read();
            runners
                .iter()
                .filter(|(_, r)| r.status() == DeviceStatus::Dirty)
                .map(|(id, _)| id.clone())
                .collect()
        };
        for id in dirty {
            info!(device = %id, "recovered dirty device");
            self.set_status(&id, DeviceStatus::Idle);
        }
    }

    async fn dispatch(&self, serial: &str) -> Option<DeviceInfo> {
        for dispatcher in &self.dispatchers {
            match dispatcher.dispatch(serial).await {
                Ok(Some(device)) => return Some(device),
                Ok(None) => continue,
                Err(e) => {
                    warn!(dispatcher = dispatcher.name(), serial, error = %e, "dispatch failed")
                }
            }
        }
        None
    }

    fn emit(&self, event: DeviceEvent) {
        // No receivers is fine; events are advisory.
        let _ = self.events.send(event);
    }
}

/// Spawn the detection and check loops.
///
/// Detection polls every `detect_interval`; dirty-device recovery runs
/// every `check_interval`. Both stop when `cancel` fires.
pub fn spawn_loops<C: Clock + 'static>(
    manager: Arc<DeviceManager<C>>,
    detect_interval: Duration,
    check_interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut detect = tokio::time::interval(detect_interval);
        let mut check = tokio::time::interval(check_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = detect.tick() => manager.detect_once().await,
                _ = check.tick() => manager.check_once(),
            }
        }
        debug!("device loops stopped");
    })
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
