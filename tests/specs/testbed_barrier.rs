// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Testbed barrier: three subdevice chains synchronize tightly around one
//! main driver.

use super::fixture::Harness;
use async_trait::async_trait;
use olc_core::{ErrorId, InfraError, JobSpecBuilder, TestResult};
use olc_device::FakeDispatcher;
use olc_engine::{Decorator, Driver, DriverRegistry, Next, TestContext};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Decorator with a 1s setup phase, recording when each setup finished.
struct SlowSetup {
    setup_done: Arc<Mutex<Vec<Instant>>>,
}

#[async_trait]
impl Decorator for SlowSetup {
    fn name(&self) -> &str {
        "slow_setup"
    }

    async fn run(&self, ctx: &TestContext, next: Next<'_>) -> Result<TestResult, InfraError> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        self.setup_done.lock().push(Instant::now());
        next.run(ctx).await
    }
}

/// Main driver recording its start instant.
struct BarrierProbe {
    started: Arc<Mutex<Option<Instant>>>,
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl Driver for BarrierProbe {
    fn name(&self) -> &str {
        "barrier_probe"
    }

    async fn run(&self, _ctx: &TestContext) -> Result<TestResult, InfraError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.started.lock() = Some(Instant::now());
        Ok(TestResult::Pass)
    }
}

fn testbed_dispatcher() -> FakeDispatcher {
    FakeDispatcher::new("android_real")
        .with_drivers(vec!["barrier_probe".to_string(), "faulty_probe".to_string()])
        .with_decorators(vec!["slow_setup".to_string(), "faulty_setup".to_string()])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn main_driver_starts_right_after_last_setup() {
    let setup_done = Arc::new(Mutex::new(Vec::new()));
    let started = Arc::new(Mutex::new(None));
    let calls = Arc::new(AtomicU32::new(0));

    let mut registry = DriverRegistry::new();
    registry.register_decorator(Arc::new(SlowSetup { setup_done: Arc::clone(&setup_done) }));
    registry.register_driver(Arc::new(BarrierProbe {
        started: Arc::clone(&started),
        calls: Arc::clone(&calls),
    }));

    let harness = Harness::with(testbed_dispatcher(), registry).await;
    for serial in ["D1", "D2", "D3"] {
        harness.detector.add(serial);
    }
    harness.devices.detect_once().await;

    let mut spec = JobSpecBuilder::default().name("mesh").build();
    spec.job_type.driver = "barrier_probe".to_string();
    spec.job_type.decorators = vec!["slow_setup".to_string()];
    spec.device_count = 3;

    let detail = harness.run_jobs(vec![spec]).await;
    assert!(detail.error.is_none(), "testbed session failed: {:?}", detail.error);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "main driver runs exactly once");

    let setups = setup_done.lock().clone();
    assert_eq!(setups.len(), 3);
    let last_setup = *setups.iter().max().unwrap();
    let driver_start = started.lock().expect("driver never started");

    // Barrier is tight: < 100ms between the last setup and the driver.
    assert!(driver_start >= last_setup);
    assert!(
        driver_start - last_setup < Duration::from_millis(100),
        "barrier too loose: {:?}",
        driver_start - last_setup
    );
}

/// Decorator that fails setup on the first subdevice.
struct FaultySetup;

#[async_trait]
impl Decorator for FaultySetup {
    fn name(&self) -> &str {
        "faulty_setup"
    }

    async fn run(&self, ctx: &TestContext, next: Next<'_>) -> Result<TestResult, InfraError> {
        if ctx.devices.first().is_some_and(|d| d.serial == "D1") {
            return Err(InfraError::new(ErrorId::PreconditionFailed, "flash failed on D1"));
        }
        next.run(ctx).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn setup_fault_skips_main_driver_and_fails_all_chains() {
    let started = Arc::new(Mutex::new(None));
    let calls = Arc::new(AtomicU32::new(0));

    let mut registry = DriverRegistry::new();
    registry.register_decorator(Arc::new(FaultySetup));
    registry.register_driver(Arc::new(BarrierProbe {
        started: Arc::clone(&started),
        calls: Arc::clone(&calls),
    }));

    let harness = Harness::with(testbed_dispatcher(), registry).await;
    for serial in ["D1", "D2", "D3"] {
        harness.detector.add(serial);
    }
    harness.devices.detect_once().await;

    let mut spec = JobSpecBuilder::default().name("mesh").build();
    spec.job_type.driver = "barrier_probe".to_string();
    spec.job_type.decorators = vec!["faulty_setup".to_string()];
    spec.device_count = 3;

    let detail = harness.run_jobs(vec![spec]).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0, "main driver must not run");
    let error = detail.error.expect("session must carry the chain error");
    assert_eq!(error.id, ErrorId::PreconditionFailed);
    assert!(error.message.contains("flash failed"));
}
