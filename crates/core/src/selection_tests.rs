// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::idle_device;
use proptest::prelude::*;

fn pixel(id: &str, variant: Option<&str>) -> DeviceInfo {
    let mut device = idle_device(id, "pixel", 34);
    device.properties.product_variant = variant.map(String::from);
    device
}

#[test]
fn empty_options_match_everything() {
    let options = DeviceSelectionOptions::default();
    assert!(matches(&pixel("d1", None), &options));
}

#[test]
fn serial_allowlist() {
    let options = DeviceSelectionOptions {
        serials: vec!["d1".to_string(), "d2".to_string()],
        ..DeviceSelectionOptions::default()
    };
    assert!(matches(&pixel("d1", None), &options));
    assert!(!matches(&pixel("d3", None), &options));
}

#[test]
fn serial_exclusion_wins_over_allowlist() {
    let options = DeviceSelectionOptions {
        serials: vec!["d1".to_string()],
        exclude_serials: vec!["d1".to_string()],
        ..DeviceSelectionOptions::default()
    };
    assert!(!matches(&pixel("d1", None), &options));
}

#[test]
fn product_type_filter() {
    let options = DeviceSelectionOptions {
        product_types: vec!["pixel".to_string()],
        ..DeviceSelectionOptions::default()
    };
    assert!(matches(&pixel("d1", None), &options));

    let mut other = pixel("d2", None);
    other.properties.product_type = Some("galaxy".to_string());
    assert!(!matches(&other, &options));

    // A device with no product type never matches a product filter.
    let mut bare = pixel("d3", None);
    bare.properties.product_type = None;
    assert!(!matches(&bare, &options));
}

#[test]
fn variant_filter_requires_matching_variant() {
    let options = DeviceSelectionOptions {
        product_types: vec!["pixel:b".to_string()],
        ..DeviceSelectionOptions::default()
    };
    assert!(matches(&pixel("d2", Some("b")), &options));
    assert!(!matches(&pixel("d1", Some("a")), &options));
    // Variant filter set, device reports no variant.
    assert!(!matches(&pixel("d3", None), &options));
}

#[test]
fn bare_type_entry_accepts_any_variant() {
    let options = DeviceSelectionOptions {
        product_types: vec!["pixel".to_string()],
        ..DeviceSelectionOptions::default()
    };
    assert!(matches(&pixel("d1", Some("a")), &options));
    assert!(matches(&pixel("d2", None), &options));
}

#[yare::parameterized(
    below_min   = { Some(30), None, 20, false },
    at_min      = { Some(30), None, 30, true },
    above_max   = { None, Some(90), 95, false },
    at_max      = { None, Some(90), 90, true },
    in_range    = { Some(30), Some(90), 50, true },
)]
fn battery_level_bounds(min: Option<u32>, max: Option<u32>, level: u32, expected: bool) {
    let mut device = pixel("d1", None);
    device.properties.battery_level = Some(level);
    let options = DeviceSelectionOptions {
        min_battery_level: min,
        max_battery_level: max,
        ..DeviceSelectionOptions::default()
    };
    assert_eq!(matches(&device, &options), expected);
}

#[test]
fn battery_bounds_require_reported_level() {
    let mut device = pixel("d1", None);
    device.properties.battery_level = None;
    let options = DeviceSelectionOptions {
        min_battery_level: Some(10),
        ..DeviceSelectionOptions::default()
    };
    assert!(!matches(&device, &options));
}

#[test]
fn battery_temperature_cap() {
    let mut device = pixel("d1", None);
    device.properties.battery_temperature_c = Some(35);
    let options = DeviceSelectionOptions {
        max_battery_temperature_c: Some(40),
        ..DeviceSelectionOptions::default()
    };
    assert!(matches(&device, &options));

    device.properties.battery_temperature_c = Some(45);
    assert!(!matches(&device, &options));

    device.properties.battery_temperature_c = None;
    assert!(!matches(&device, &options));
}

#[test]
fn sdk_bounds() {
    let options = DeviceSelectionOptions {
        min_sdk_version: Some(30),
        max_sdk_version: Some(34),
        ..DeviceSelectionOptions::default()
    };
    assert!(matches(&idle_device("d1", "pixel", 34), &options));
    assert!(!matches(&idle_device("d2", "pixel", 29), &options));
    assert!(!matches(&idle_device("d3", "pixel", 35), &options));
}

#[test]
fn device_property_equality() {
    let mut device = pixel("d1", None);
    device.properties.extra.insert("abi".to_string(), "arm64-v8a".to_string());

    let mut options = DeviceSelectionOptions::default();
    options.device_properties.insert("abi".to_string(), "arm64-v8a".to_string());
    assert!(matches(&device, &options));

    options.device_properties.insert("abi".to_string(), "x86_64".to_string());
    assert!(!matches(&device, &options));

    let mut missing = DeviceSelectionOptions::default();
    missing.device_properties.insert("ram".to_string(), "8g".to_string());
    assert!(!matches(&device, &missing));
}

#[test]
fn parse_rejects_double_colon() {
    let err = parse_product_filters(&["pixel:a:b".to_string()]).unwrap_err();
    assert_eq!(err.id(), crate::error::ErrorId::InvalidArgument);
}

#[test]
fn parse_merges_variants_per_type() {
    let filters = parse_product_filters(&[
        "pixel:a".to_string(),
        "pixel:b".to_string(),
        "galaxy".to_string(),
    ])
    .unwrap();
    assert_eq!(filters["pixel"].len(), 2);
    assert!(filters["galaxy"].is_empty());
}

#[yare::parameterized(
    empty_entry    = { "" },
    empty_variant  = { "pixel:" },
    empty_type     = { ":a" },
)]
fn parse_rejects_malformed(entry: &str) {
    assert!(parse_product_filters(&[entry.to_string()]).is_err());
}

#[test]
fn inverted_bounds_rejected_at_validation() {
    let options = DeviceSelectionOptions {
        min_battery_level: Some(90),
        max_battery_level: Some(10),
        ..DeviceSelectionOptions::default()
    };
    assert!(options.validate().is_err());

    let options = DeviceSelectionOptions {
        min_sdk_version: Some(34),
        max_sdk_version: Some(30),
        ..DeviceSelectionOptions::default()
    };
    assert!(options.validate().is_err());
}

proptest! {
    /// matches() is pure: same inputs, same answer.
    #[test]
    fn matcher_is_deterministic(
        level in proptest::option::of(0u32..100),
        sdk in proptest::option::of(20u32..40),
        min in proptest::option::of(0u32..100),
        max in proptest::option::of(0u32..100),
    ) {
        let mut device = pixel("d1", None);
        device.properties.battery_level = level;
        device.properties.sdk_version = sdk;
        let options = DeviceSelectionOptions {
            min_battery_level: min,
            max_battery_level: max,
            ..DeviceSelectionOptions::default()
        };
        let first = matches(&device, &options);
        let second = matches(&device, &options);
        prop_assert_eq!(first, second);
    }
}
