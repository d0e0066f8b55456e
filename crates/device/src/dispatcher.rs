// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatcher chain: turns detected serials into typed device records.

use async_trait::async_trait;
use olc_core::{DeviceInfo, InfraError};

/// Builds a typed [`DeviceInfo`] for serials it recognizes.
///
/// Dispatchers form a chain; the first one that claims a serial wins.
/// Returning `Ok(None)` passes the serial to the next dispatcher.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &str;

    async fn dispatch(&self, serial: &str) -> Result<Option<DeviceInfo>, InfraError>;
}

/// Dispatcher producing uniform fake devices, configurable per instance.
///
/// Serves as the tail of the chain in tests and local bring-up: claims
/// every serial and reports the attributes it was constructed with.
pub struct FakeDispatcher {
    device_type: String,
    drivers: Vec<String>,
    decorators: Vec<String>,
    configure: Option<Box<dyn Fn(&mut DeviceInfo) + Send + Sync>>,
}

impl FakeDispatcher {
    pub fn new(device_type: impl Into<String>) -> Self {
        Self {
            device_type: device_type.into(),
            // Fake devices execute the built-in drivers out of the box.
            drivers: vec!["noop".to_string(), "sleep".to_string()],
            decorators: Vec::new(),
            configure: None,
        }
    }

    pub fn with_drivers(mut self, drivers: Vec<String>) -> Self {
        self.drivers = drivers;
        self
    }

    pub fn with_decorators(mut self, decorators: Vec<String>) -> Self {
        self.decorators = decorators;
        self
    }

    /// Per-device customization hook, keyed off the serial in the closure.
    pub fn with_configure(
        mut self,
        configure: impl Fn(&mut DeviceInfo) + Send + Sync + 'static,
    ) -> Self {
        self.configure = Some(Box::new(configure));
        self
    }
}

#[async_trait]
impl Dispatcher for FakeDispatcher {
    fn name(&self) -> &str {
        "fake"
    }

    async fn dispatch(&self, serial: &str) -> Result<Option<DeviceInfo>, InfraError> {
        let mut device = DeviceInfo::new(serial, serial);
        device.types = vec![self.device_type.clone()];
        device.drivers = self.drivers.iter().cloned().collect();
        device.decorators = self.decorators.iter().cloned().collect();
        if let Some(configure) = &self.configure {
            configure(&mut device);
        }
        Ok(Some(device))
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
