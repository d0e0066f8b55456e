// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device detectors: probes that report currently visible serials.

use async_trait::async_trait;
use olc_core::InfraError;
use parking_lot::RwLock;

/// A probe for attached devices.
///
/// Detectors only report serials; turning a serial into a typed device is
/// the dispatcher chain's job. Detectors are polled on the manager's
/// detection interval and must not block for long.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &str;

    /// Serials currently visible to this probe.
    async fn detect(&self) -> Result<Vec<String>, InfraError>;
}

/// In-memory detector backed by a mutable serial set.
///
/// The production build wires transport-specific probes here; this one
/// also drives every integration test (register/unregister devices at
/// will, the manager picks the change up on its next poll).
#[derive(Default)]
pub struct StaticDetector {
    serials: RwLock<Vec<String>>,
}

impl StaticDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, serial: impl Into<String>) {
        let serial = serial.into();
        let mut serials = self.serials.write();
        if !serials.contains(&serial) {
            serials.push(serial);
        }
    }

    pub fn remove(&self, serial: &str) {
        self.serials.write().retain(|s| s != serial);
    }
}

#[async_trait]
impl Detector for StaticDetector {
    fn name(&self) -> &str {
        "static"
    }

    async fn detect(&self) -> Result<Vec<String>, InfraError> {
        Ok(self.serials.read().clone())
    }
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
