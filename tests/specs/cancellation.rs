// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellation: a sleeping driver is interrupted and the session settles
//! promptly.

use super::fixture::{job_session_config, pixel_dispatcher, Harness};
use olc_core::{
    JobSpecBuilder, SessionResult, SessionState, TestResult, TestStatus, CANCEL_SESSION,
};
use std::time::{Duration, Instant};

fn sleeping_job(ms: u64) -> olc_core::JobSpec {
    let mut spec = JobSpecBuilder::default().name("sleeper").build();
    spec.job_type.driver = "sleep".to_string();
    spec.params.insert("sleep_ms".to_string(), ms.to_string());
    spec
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_interrupts_sleeping_driver() {
    let harness = Harness::with_devices(pixel_dispatcher(), &["D1"]).await;

    let id = harness
        .sessions
        .create_session(job_session_config(vec![sleeping_job(60_000)]))
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let cancelled_at = Instant::now();
    harness.sessions.notify(id.as_str(), CANCEL_SESSION).unwrap();

    let detail = harness
        .sessions
        .wait(id.as_str(), Some(Duration::from_secs(10)))
        .await
        .unwrap();

    assert!(cancelled_at.elapsed() < Duration::from_secs(5), "cancel must settle fast");
    assert_eq!(detail.state, SessionState::Finished { result: SessionResult::Cancelled });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_test_ends_skipped_or_suspended() {
    let harness = Harness::with_devices(pixel_dispatcher(), &["D1"]).await;

    // Observe the test records through a plugin-free path: run the job
    // directly and cancel its token mid-sleep.
    let cancel = harness.cancel.child_token();
    let runner = olc_engine::JobRunner::new(
        sleeping_job(60_000),
        harness.scheduler.clone(),
        std::sync::Arc::clone(&harness.devices),
        std::sync::Arc::new(olc_engine::DriverRegistry::builtin()),
        harness.clock.clone(),
        cancel.clone(),
    );
    let job = tokio::spawn(runner.run());
    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(5), job)
        .await
        .expect("cancel did not interrupt the driver")
        .unwrap();
    let test = &outcome.tests[0];
    assert!(
        test.status == TestStatus::Suspended
            || (test.status == TestStatus::Done && test.result == TestResult::Skip),
        "unexpected terminal state: {:?}/{:?}",
        test.status,
        test.result
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn repeated_cancels_equal_one() {
    let harness = Harness::with_devices(pixel_dispatcher(), &["D1"]).await;
    let id = harness
        .sessions
        .create_session(job_session_config(vec![sleeping_job(60_000)]))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    for _ in 0..5 {
        harness.sessions.notify(id.as_str(), CANCEL_SESSION).unwrap();
    }
    let detail = harness
        .sessions
        .wait(id.as_str(), Some(Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(detail.state, SessionState::Finished { result: SessionResult::Cancelled });
}
