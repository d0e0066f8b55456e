// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Allocation: the binding of a test to the devices it runs on.

use crate::device::DeviceId;
use crate::test::TestId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an allocation.
    pub struct AllocationId("alc-");
}

/// A test bound to an ordered list of devices.
///
/// Created only by the scheduler; owned by exactly one running test;
/// released when the test completes. A device appears in at most one live
/// allocation at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: AllocationId,
    pub test_id: TestId,
    /// Devices in testbed order: index 0 is the primary device.
    pub devices: Vec<DeviceId>,
    pub created_at_ms: u64,
}

impl Allocation {
    pub fn new(test_id: TestId, devices: Vec<DeviceId>, created_at_ms: u64) -> Self {
        Self { id: AllocationId::generate(), test_id, devices, created_at_ms }
    }

    pub fn primary_device(&self) -> Option<&DeviceId> {
        self.devices.first()
    }

    pub fn is_testbed(&self) -> bool {
        self.devices.len() > 1
    }
}

#[cfg(test)]
#[path = "allocation_tests.rs"]
mod tests;
