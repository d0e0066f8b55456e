// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-device runner: owns one device's record and bootstrap.

use olc_core::{DeviceHealth, DeviceInfo, DeviceStatus};
use parking_lot::RwLock;

/// Owns the live record for one device.
///
/// The manager holds one runner per known device; everyone else works on
/// cloned snapshots. Status writes go through the runner so the
/// status-change timestamp stays monotonic.
pub struct DeviceRunner {
    info: RwLock<DeviceInfo>,
}

impl DeviceRunner {
    pub fn new(info: DeviceInfo) -> Self {
        Self { info: RwLock::new(info) }
    }

    /// Bring the device from `Prepping` to `Idle`.
    ///
    /// Real device types hook their connection setup here; the base runner
    /// just flips the state.
    pub fn bootstrap(&self, now_ms: u64) {
        let mut info = self.info.write();
        if info.status == DeviceStatus::Prepping {
            info.set_status(DeviceStatus::Idle, now_ms);
        }
    }

    pub fn snapshot(&self) -> DeviceInfo {
        self.info.read().clone()
    }

    pub fn status(&self) -> DeviceStatus {
        self.info.read().status
    }

    /// Set the status; returns true when it actually changed.
    pub fn set_status(&self, status: DeviceStatus, now_ms: u64) -> bool {
        let mut info = self.info.write();
        if info.status == status {
            return false;
        }
        info.set_status(status, now_ms);
        true
    }

    pub fn set_health(&self, health: DeviceHealth) {
        self.info.write().health = health;
    }

    pub fn serial(&self) -> String {
        self.info.read().serial.clone()
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
