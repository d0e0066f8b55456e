// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn bootstrap_moves_prepping_to_idle() {
    let runner = DeviceRunner::new(DeviceInfo::new("d1", "d1"));
    assert_eq!(runner.status(), DeviceStatus::Prepping);
    runner.bootstrap(1_000);
    assert_eq!(runner.status(), DeviceStatus::Idle);
}

#[test]
fn bootstrap_only_applies_to_prepping() {
    let runner = DeviceRunner::new(DeviceInfo::new("d1", "d1"));
    runner.set_status(DeviceStatus::Busy, 1_000);
    runner.bootstrap(2_000);
    assert_eq!(runner.status(), DeviceStatus::Busy);
}

#[test]
fn set_status_reports_changes_only() {
    let runner = DeviceRunner::new(DeviceInfo::new("d1", "d1"));
    assert!(runner.set_status(DeviceStatus::Idle, 1_000));
    assert!(!runner.set_status(DeviceStatus::Idle, 2_000));
    assert_eq!(runner.snapshot().status_since_ms, 1_000);
}

#[test]
fn set_health_reflected_in_snapshot() {
    let runner = DeviceRunner::new(DeviceInfo::new("d1", "d1"));
    runner.set_health(DeviceHealth::Failed);
    assert_eq!(runner.snapshot().health, DeviceHealth::Failed);
}
