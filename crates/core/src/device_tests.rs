// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn new_device_starts_prepping() {
    let device = DeviceInfo::new("emulator-5554", "emulator-5554");
    assert_eq!(device.status, DeviceStatus::Prepping);
    assert_eq!(device.health, DeviceHealth::Ok);
    assert_eq!(device.uuid.len(), 36);
}

#[test]
fn status_timestamp_is_monotonic() {
    let mut device = DeviceInfo::new("d1", "d1");
    device.set_status(DeviceStatus::Idle, 100);
    assert_eq!(device.status_since_ms, 100);

    // A stale clock reading must not move the timestamp backwards.
    device.set_status(DeviceStatus::Busy, 50);
    assert_eq!(device.status, DeviceStatus::Busy);
    assert_eq!(device.status_since_ms, 100);

    device.set_status(DeviceStatus::Idle, 200);
    assert_eq!(device.status_since_ms, 200);
}

#[test]
fn same_status_does_not_touch_timestamp() {
    let mut device = DeviceInfo::new("d1", "d1");
    device.set_status(DeviceStatus::Idle, 100);
    device.set_status(DeviceStatus::Idle, 500);
    assert_eq!(device.status_since_ms, 100);
}

#[test]
fn properties_get_covers_typed_and_extra() {
    let mut props = DeviceProperties::default();
    props.battery_level = Some(85);
    props.sdk_version = Some(34);
    props.product_type = Some("pixel".to_string());
    props.extra.insert("abi".to_string(), "arm64-v8a".to_string());

    assert_eq!(props.get("battery_level").as_deref(), Some("85"));
    assert_eq!(props.get("sdk_version").as_deref(), Some("34"));
    assert_eq!(props.get("product_type").as_deref(), Some("pixel"));
    assert_eq!(props.get("abi").as_deref(), Some("arm64-v8a"));
    assert_eq!(props.get("unknown"), None);
}

#[test]
fn driver_and_decorator_support() {
    let mut device = DeviceInfo::new("d1", "d1");
    device.drivers.insert("mobly".to_string());
    device.decorators.insert("reboot".to_string());
    device.decorators.insert("install_apk".to_string());

    assert!(device.supports_driver("mobly"));
    assert!(!device.supports_driver("robo"));
    assert!(device.supports_decorators(&["reboot".to_string(), "install_apk".to_string()]));
    assert!(!device.supports_decorators(&["reboot".to_string(), "flash".to_string()]));
}

#[test]
fn device_id_borrow_lookup() {
    use std::collections::HashMap;
    let mut map: HashMap<DeviceId, u32> = HashMap::new();
    map.insert(DeviceId::new("serial-9"), 7);
    assert_eq!(map.get("serial-9"), Some(&7));
}

#[test]
fn device_serde_round_trip() {
    let device = DeviceInfo::builder().serial("pixel-7a").build();
    let json = serde_json::to_string(&device).unwrap();
    let parsed: DeviceInfo = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, device);
}
