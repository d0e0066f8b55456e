// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use olc_core::test_support::idle_device;

#[yare::parameterized(
    idle_ok      = { DeviceStatus::Idle, DeviceHealth::Ok, true },
    busy_ok      = { DeviceStatus::Busy, DeviceHealth::Ok, true },
    missing      = { DeviceStatus::Missing, DeviceHealth::Ok, false },
    failed       = { DeviceStatus::Idle, DeviceHealth::Failed, false },
    missing_dead = { DeviceStatus::Missing, DeviceHealth::Failed, false },
)]
fn release_decision(status: DeviceStatus, health: DeviceHealth, clean: bool) {
    let checker = StandardStateChecker;
    let mut device = idle_device("d1", "pixel", 34);
    device.status = status;
    device.health = health;

    let decision = checker.check(&device);
    assert_eq!(decision == ReleaseDecision::Clean, clean, "unexpected: {decision:?}");
}

#[test]
fn dirty_reasons_name_the_cause() {
    let checker = StandardStateChecker;
    let mut device = idle_device("d1", "pixel", 34);
    device.status = DeviceStatus::Missing;

    let ReleaseDecision::Dirty { reason } = checker.check(&device) else {
        panic!("expected dirty");
    };
    assert!(reason.contains("missing"));
}
