// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fail-fast allocation: no devices registered, strategy aborts at once.

use super::fixture::{pixel_dispatcher, Harness};
use olc_core::{
    AllocationExitStrategy, ErrorId, JobSpecBuilder, SessionResult, SessionState,
};
use std::time::{Duration, Instant};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn no_idle_devices_aborts_within_a_tick() {
    let harness = Harness::with_devices(pixel_dispatcher(), &[]).await;

    let mut spec = JobSpecBuilder::default().name("urgent").build();
    spec.setting.exit_strategy = AllocationExitStrategy::FailFastNoIdle;

    let started = Instant::now();
    let detail = harness.run_jobs(vec![spec]).await;

    // One scheduler tick, not the allocation timeout.
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(detail.state, SessionState::Finished { result: SessionResult::Error });
    assert_eq!(detail.error.as_ref().unwrap().id, ErrorId::AllocationAborted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn normal_strategy_keeps_waiting_instead() {
    let harness = Harness::with_devices(pixel_dispatcher(), &[]).await;

    let spec = JobSpecBuilder::default().name("patient").build();
    let id = harness
        .sessions
        .create_session(super::fixture::job_session_config(vec![spec]))
        .unwrap();

    // Still running after a while: the request is parked, not aborted.
    let detail = harness
        .sessions
        .wait(id.as_str(), Some(Duration::from_millis(500)))
        .await
        .unwrap();
    assert!(!detail.state.is_finished());

    // A device arriving later completes it.
    harness.add_device("D1").await;
    let detail = harness
        .sessions
        .wait(id.as_str(), Some(Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(detail.state, SessionState::Finished { result: SessionResult::Completed });
}
