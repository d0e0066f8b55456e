// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device selection filters and the scheduler matching predicate.
//!
//! `matches` is pure: it depends only on the device's reported attributes
//! and the options. Validation of the options themselves happens once at
//! the wire/plugin boundary via [`DeviceSelectionOptions::validate`].

use crate::device::DeviceInfo;
use crate::error::{ErrorId, InfraError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Filter set a job applies to candidate devices.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceSelectionOptions {
    /// When non-empty, only these device ids are eligible.
    #[serde(default)]
    pub serials: Vec<String>,
    /// Device ids that are never eligible.
    #[serde(default)]
    pub exclude_serials: Vec<String>,
    /// Product-type filter entries, each `type` or `type:variant`.
    #[serde(default)]
    pub product_types: Vec<String>,
    /// Property equality requirements.
    #[serde(default)]
    pub device_properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_sdk_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sdk_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_battery_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_battery_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_battery_temperature_c: Option<i32>,
}

/// Parse `type` / `type:variant` entries into a type → variants map.
/// An empty variant set means any variant of that product type.
///
/// More than one colon in an entry is a configuration error.
pub fn parse_product_filters(
    entries: &[String],
) -> Result<BTreeMap<String, BTreeSet<String>>, InfraError> {
    let mut filters: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for entry in entries {
        let mut parts = entry.splitn(3, ':');
        let product = parts.next().unwrap_or_default();
        let variant = parts.next();
        if parts.next().is_some() {
            return Err(InfraError::new(
                ErrorId::InvalidArgument,
                format!("malformed product filter {entry:?}: at most one ':' allowed"),
            ));
        }
        if product.is_empty() {
            return Err(InfraError::new(
                ErrorId::InvalidArgument,
                format!("malformed product filter {entry:?}: empty product type"),
            ));
        }
        let variants = filters.entry(product.to_string()).or_default();
        if let Some(v) = variant {
            if v.is_empty() {
                return Err(InfraError::new(
                    ErrorId::InvalidArgument,
                    format!("malformed product filter {entry:?}: empty variant"),
                ));
            }
            variants.insert(v.to_string());
        }
    }
    Ok(filters)
}

impl DeviceSelectionOptions {
    /// Boundary validation; called once when a job spec enters the system.
    pub fn validate(&self) -> Result<(), InfraError> {
        parse_product_filters(&self.product_types)?;
        if let (Some(min), Some(max)) = (self.min_battery_level, self.max_battery_level) {
            if min > max {
                return Err(InfraError::new(
                    ErrorId::InvalidArgument,
                    format!("battery level bounds inverted: min {min} > max {max}"),
                ));
            }
        }
        if let (Some(min), Some(max)) = (self.min_sdk_version, self.max_sdk_version) {
            if min > max {
                return Err(InfraError::new(
                    ErrorId::InvalidArgument,
                    format!("sdk version bounds inverted: min {min} > max {max}"),
                ));
            }
        }
        Ok(())
    }
}

/// The scheduler matching predicate.
///
/// All filter groups must pass. Malformed product-filter entries (already
/// rejected at the boundary) match nothing here.
pub fn matches(device: &DeviceInfo, options: &DeviceSelectionOptions) -> bool {
    let id = device.control_id.as_str();

    if !options.serials.is_empty() && !options.serials.iter().any(|s| s == id) {
        return false;
    }
    if options.exclude_serials.iter().any(|s| s == id) {
        return false;
    }

    if !options.product_types.is_empty() {
        let Ok(filters) = parse_product_filters(&options.product_types) else {
            return false;
        };
        let Some(product) = device.properties.product_type.as_deref().filter(|p| !p.is_empty())
        else {
            return false;
        };
        let Some(variants) = filters.get(product) else {
            return false;
        };
        if !variants.is_empty() {
            let Some(variant) =
                device.properties.product_variant.as_deref().filter(|v| !v.is_empty())
            else {
                return false;
            };
            if !variants.contains(variant) {
                return false;
            }
        }
    }

    if options.min_battery_level.is_some() || options.max_battery_level.is_some() {
        let Some(level) = device.properties.battery_level else {
            return false;
        };
        if options.min_battery_level.is_some_and(|min| level < min) {
            return false;
        }
        if options.max_battery_level.is_some_and(|max| level > max) {
            return false;
        }
    }

    if let Some(max_temp) = options.max_battery_temperature_c {
        let Some(temp) = device.properties.battery_temperature_c else {
            return false;
        };
        if temp > max_temp {
            return false;
        }
    }

    if options.min_sdk_version.is_some() || options.max_sdk_version.is_some() {
        let Some(sdk) = device.properties.sdk_version else {
            return false;
        };
        if options.min_sdk_version.is_some_and(|min| sdk < min) {
            return false;
        }
        if options.max_sdk_version.is_some_and(|max| sdk > max) {
            return false;
        }
    }

    options
        .device_properties
        .iter()
        .all(|(k, v)| device.properties.get(k).as_deref() == Some(v.as_str()))
}

#[cfg(test)]
#[path = "selection_tests.rs"]
mod tests;
