// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Happy path: one device, one job, one test, everything passes.

use super::fixture::{pixel_dispatcher, Harness};
use olc_core::{
    DeviceStatus, JobSpecBuilder, SessionResult, SessionState, TestResult, TestStatus,
};
use olc_engine::{DriverRegistry, JobEventHandler};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_device_session_completes() {
    let harness = Harness::with_devices(pixel_dispatcher(), &["D1"]).await;

    let mut spec = JobSpecBuilder::default().name("boot-check").build();
    spec.selection.product_types = vec!["pixel".to_string()];

    let detail = harness.run_jobs(vec![spec]).await;

    assert_eq!(detail.state, SessionState::Finished { result: SessionResult::Completed });
    assert!(detail.error.is_none());
    assert_eq!(detail.job_ids.len(), 1);

    // The device went through exactly one allocation and came back clean.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.device("D1").unwrap().status, DeviceStatus::Idle);
}

/// Counts allocations and dirty flags seen on the job bus.
#[derive(Default)]
struct AllocationObserver {
    executions: Mutex<Vec<bool>>,
    test_results: Mutex<Vec<(TestStatus, TestResult)>>,
}

impl JobEventHandler for AllocationObserver {
    fn handle(&self, event: &olc_core::JobEvent) -> Result<(), olc_core::InfraError> {
        match event {
            olc_core::JobEvent::TestExecutionEnded { need_reboot, .. } => {
                self.executions.lock().push(*need_reboot);
            }
            olc_core::JobEvent::TestEnded { test, .. } => {
                self.test_results.lock().push((test.status, test.result));
            }
            _ => {}
        }
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn exactly_one_clean_allocation() {
    let harness = Harness::with_devices(pixel_dispatcher(), &["D1"]).await;

    // Drive one job directly through the runner so the bus is observable.
    let mut spec = JobSpecBuilder::default().name("boot-check").build();
    spec.selection.product_types = vec!["pixel".to_string()];
    let runner = olc_engine::JobRunner::new(
        spec,
        harness.scheduler.clone(),
        Arc::clone(&harness.devices),
        Arc::new(DriverRegistry::builtin()),
        harness.clock.clone(),
        harness.cancel.child_token(),
    );
    let observer = Arc::new(AllocationObserver::default());
    runner.bus().register("observer", Arc::clone(&observer) as Arc<dyn JobEventHandler>);

    let outcome = runner.run().await;

    assert!(outcome.error.is_none());
    let executions = observer.executions.lock().clone();
    assert_eq!(executions, vec![false], "one allocation, released clean");
    let results = observer.test_results.lock().clone();
    assert_eq!(results, vec![(TestStatus::Done, TestResult::Pass)]);
}
