// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::device::{DeviceInfo, DeviceStatus};
use crate::job::JobId;
use crate::test::Test;

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for core state machine types.
pub mod strategies {
    use crate::session::{SessionResult, SessionState};
    use crate::test::{TestResult, TestStatus};
    use proptest::prelude::*;

    pub fn arb_test_status() -> impl Strategy<Value = TestStatus> {
        prop_oneof![
            Just(TestStatus::New),
            Just(TestStatus::WaitingAllocation),
            Just(TestStatus::Assigned),
            Just(TestStatus::Running),
            Just(TestStatus::Done),
            Just(TestStatus::Suspended),
        ]
    }

    pub fn arb_test_result() -> impl Strategy<Value = TestResult> {
        prop_oneof![
            Just(TestResult::Unknown),
            Just(TestResult::Pass),
            Just(TestResult::Fail),
            Just(TestResult::Error),
            Just(TestResult::Skip),
            Just(TestResult::Timeout),
        ]
    }

    pub fn arb_session_state() -> impl Strategy<Value = SessionState> {
        prop_oneof![
            Just(SessionState::Submitted),
            Just(SessionState::Starting),
            Just(SessionState::Running),
            Just(SessionState::Finished { result: SessionResult::Completed }),
            Just(SessionState::Finished { result: SessionResult::Error }),
            Just(SessionState::Finished { result: SessionResult::Cancelled }),
        ]
    }
}

// ── Fixture factories ───────────────────────────────────────────────────

/// An idle android device with the given id/serial, product, and sdk.
pub fn idle_device(id: &str, product: &str, sdk: u32) -> DeviceInfo {
    let mut device = DeviceInfo::new(id, id);
    device.status = DeviceStatus::Idle;
    device.types = vec!["android_real".to_string()];
    device.drivers.insert("noop".to_string());
    device.properties.product_type = Some(product.to_string());
    device.properties.sdk_version = Some(sdk);
    device.properties.battery_level = Some(80);
    device
}

/// A fresh test record in `New` status.
pub fn new_test(job_id: &JobId, name: &str) -> Test {
    Test::new(*job_id, name, 1_000_000)
}
