// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composite device dimensions.
//!
//! A dimension is a tag/value pair. Devices declare `supported` dimensions
//! (multi-valued) plus `required` dimensions a job MUST also carry; jobs
//! declare the dimensions they require of a device.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Multi-valued dimension maps for a device or job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DimensionSet {
    /// Dimensions offered (device) or demanded (job).
    #[serde(default)]
    pub supported: BTreeMap<String, Vec<String>>,
    /// Dimensions the device insists its jobs declare.
    #[serde(default)]
    pub required: BTreeMap<String, Vec<String>>,
}

impl DimensionSet {
    /// Add a supported dimension value.
    pub fn support(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.supported.entry(key.into()).or_default().push(value.into());
        self
    }

    /// Add a required dimension value.
    pub fn require(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.required.entry(key.into()).or_default().push(value.into());
        self
    }

    /// Whether `key=value` appears in the supported or required map.
    ///
    /// Required dimensions are implicitly supported: a device that requires
    /// `pool=shared` can serve a job demanding `pool=shared`.
    pub fn supports(&self, key: &str, value: &str) -> bool {
        let hit = |m: &BTreeMap<String, Vec<String>>| {
            m.get(key).is_some_and(|vs| vs.iter().any(|v| v == value))
        };
        hit(&self.supported) || hit(&self.required)
    }

    /// Whether this device satisfies every dimension `job` demands, and the
    /// job declares every dimension this device requires.
    pub fn satisfies(&self, job: &DimensionSet) -> bool {
        let job_demands_met = job
            .supported
            .iter()
            .all(|(k, vs)| vs.iter().all(|v| self.supports(k, v)));
        let device_requirements_met = self
            .required
            .iter()
            .all(|(k, vs)| vs.iter().all(|v| job.supports(k, v)));
        job_demands_met && device_requirements_met
    }

    pub fn is_empty(&self) -> bool {
        self.supported.is_empty() && self.required.is_empty()
    }
}

#[cfg(test)]
#[path = "dimension_tests.rs"]
mod tests;
