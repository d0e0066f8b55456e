// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Product/variant selection: `pixel:b` must pick the variant-b device.

use super::fixture::Harness;
use olc_core::{DeviceStatus, JobSpecBuilder, SessionResult, SessionState};
use olc_device::FakeDispatcher;
use std::time::Duration;

fn variant_dispatcher() -> FakeDispatcher {
    FakeDispatcher::new("android_real").with_configure(|device| {
        device.properties.product_type = Some("pixel".to_string());
        device.properties.product_variant =
            Some(if device.serial == "D2" { "b".to_string() } else { "a".to_string() });
        device.properties.sdk_version = Some(34);
        device.properties.battery_level = Some(80);
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn variant_filter_allocates_matching_device_only() {
    let harness = Harness::with_devices(variant_dispatcher(), &["D1", "D2"]).await;

    let mut spec = JobSpecBuilder::default().name("variant-run").build();
    spec.selection.product_types = vec!["pixel:b".to_string()];

    // Watch D1 the whole time: it must never be considered a match.
    let d1_watch = {
        let devices = std::sync::Arc::clone(&harness.devices);
        let stop = harness.cancel.child_token();
        tokio::spawn(async move {
            loop {
                if stop.is_cancelled() {
                    return true;
                }
                if let Some(runner) = devices.runner(&olc_core::DeviceId::new("D1")) {
                    if runner.status() != DeviceStatus::Idle {
                        return false;
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
    };

    let detail = harness.run_jobs(vec![spec]).await;
    assert_eq!(detail.state, SessionState::Finished { result: SessionResult::Completed });

    harness.cancel.cancel();
    assert!(d1_watch.await.unwrap(), "D1 must never leave the idle pool");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.device("D2").unwrap().status, DeviceStatus::Idle);
}
