// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device identity, status, and reported attributes.

use crate::dimension::DimensionSet;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

/// Control identifier of a device.
///
/// For locally attached hardware this is normally the serial; virtual
/// devices get synthesized ids. Serials can exceed the inline-id budget, so
/// this is a plain string newtype.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for DeviceId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for DeviceId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for DeviceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Scheduling status of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Idle,
    Busy,
    Prepping,
    Missing,
    Dirty,
}

crate::simple_display! {
    DeviceStatus {
        Idle => "idle",
        Busy => "busy",
        Prepping => "prepping",
        Missing => "missing",
        Dirty => "dirty",
    }
}

/// Health as judged by the device's runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceHealth {
    #[default]
    Ok,
    Failed,
}

/// Runtime attributes a device reports about itself.
///
/// Typed fields cover the attributes the scheduler filters on; everything
/// else lands in `extra`. `get` presents both as one string-keyed map.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_temperature_c: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_variant: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl DeviceProperties {
    /// Look up a property by name, covering typed fields and `extra`.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "battery_level" => self.battery_level.map(|v| v.to_string()),
            "battery_temperature" => self.battery_temperature_c.map(|v| v.to_string()),
            "sdk_version" => self.sdk_version.map(|v| v.to_string()),
            "product_type" => self.product_type.clone(),
            "product_variant" => self.product_variant.clone(),
            _ => self.extra.get(key).cloned(),
        }
    }
}

/// Full description of a device as tracked by the manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub control_id: DeviceId,
    /// Stable hardware uuid, independent of transport reconnects.
    pub uuid: String,
    pub serial: String,
    /// Device type tags, e.g. `android_real`, `android_emulator`.
    #[serde(default)]
    pub types: Vec<String>,
    /// Drivers this device can execute.
    #[serde(default)]
    pub drivers: BTreeSet<String>,
    /// Decorators this device can execute.
    #[serde(default)]
    pub decorators: BTreeSet<String>,
    #[serde(default)]
    pub dimensions: DimensionSet,
    #[serde(default)]
    pub properties: DeviceProperties,
    pub status: DeviceStatus,
    /// When `status` last changed; monotonic per device.
    pub status_since_ms: u64,
    #[serde(default)]
    pub health: DeviceHealth,
}

impl DeviceInfo {
    pub fn new(control_id: impl Into<DeviceId>, serial: impl Into<String>) -> Self {
        Self {
            control_id: control_id.into(),
            uuid: uuid::Uuid::new_v4().to_string(),
            serial: serial.into(),
            types: Vec::new(),
            drivers: BTreeSet::new(),
            decorators: BTreeSet::new(),
            dimensions: DimensionSet::default(),
            properties: DeviceProperties::default(),
            status: DeviceStatus::Prepping,
            status_since_ms: 0,
            health: DeviceHealth::Ok,
        }
    }

    /// Update the status, keeping the change timestamp monotonic.
    pub fn set_status(&mut self, status: DeviceStatus, now_ms: u64) {
        if status != self.status {
            self.status = status;
            self.status_since_ms = self.status_since_ms.max(now_ms);
        }
    }

    pub fn supports_driver(&self, driver: &str) -> bool {
        self.drivers.contains(driver)
    }

    pub fn supports_decorators(&self, decorators: &[String]) -> bool {
        decorators.iter().all(|d| self.decorators.contains(d))
    }
}

crate::builder! {
    pub struct DeviceInfoBuilder => DeviceInfo {
        into {
            uuid: String = "00000000-0000-0000-0000-000000000000",
            serial: String = "serial-1",
        }
        set {
            control_id: DeviceId = DeviceId::new("serial-1"),
            types: Vec<String> = vec!["android_real".to_string()],
            drivers: BTreeSet<String> = BTreeSet::new(),
            decorators: BTreeSet<String> = BTreeSet::new(),
            dimensions: DimensionSet = DimensionSet::default(),
            properties: DeviceProperties = DeviceProperties::default(),
            status: DeviceStatus = DeviceStatus::Idle,
            status_since_ms: u64 = 0,
            health: DeviceHealth = DeviceHealth::Ok,
        }
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
