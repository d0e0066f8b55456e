// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Driver and decorator execution seams.
//!
//! A test runs as a chain: decorators nested outermost-first around a
//! driver. Decorators call `next.run(ctx)` to descend; whatever they do
//! before/after that call is their setup/teardown.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use olc_core::{
    Allocation, DeviceInfo, ErrorRecord, InfraError, JobId, Test, TestId, TestResult,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Execution context for one test attempt.
///
/// Cheap to clone; all mutable state is behind shared cells. The recorder
/// is the live test record — log lines, properties, and subtests written
/// here are visible to status queries while the test runs.
#[derive(Clone)]
pub struct TestContext {
    pub job_id: JobId,
    pub test_id: TestId,
    pub test_name: String,
    pub params: HashMap<String, String>,
    pub allocation: Allocation,
    /// Device snapshots in allocation order; index 0 is the primary.
    pub devices: Vec<DeviceInfo>,
    /// Fires when the test is cancelled or timed out.
    pub cancel: CancellationToken,
    recorder: Arc<Mutex<Test>>,
    need_reboot: Arc<AtomicBool>,
    now_ms: Arc<dyn Fn() -> u64 + Send + Sync>,
}

impl TestContext {
    pub fn new(
        params: HashMap<String, String>,
        allocation: Allocation,
        devices: Vec<DeviceInfo>,
        cancel: CancellationToken,
        recorder: Arc<Mutex<Test>>,
        now_ms: Arc<dyn Fn() -> u64 + Send + Sync>,
    ) -> Self {
        let (job_id, test_id, test_name) = {
            let test = recorder.lock();
            (test.job_id, test.id, test.name.clone())
        };
        Self {
            job_id,
            test_id,
            test_name,
            params,
            allocation,
            devices,
            cancel,
            recorder,
            need_reboot: Arc::new(AtomicBool::new(false)),
            now_ms,
        }
    }

    pub fn device(&self, index: usize) -> Option<&DeviceInfo> {
        self.devices.get(index)
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Append a line to the test's log buffer.
    pub fn log(&self, line: &str) {
        self.recorder.lock().log_line(line);
    }

    pub fn set_property(&self, key: impl Into<String>, value: impl Into<String>) {
        self.recorder.lock().properties.insert(key.into(), value.into());
    }

    /// Record a sub-result under this test.
    pub fn add_subtest(&self, name: &str, result: TestResult, cause: Option<ErrorRecord>) {
        let mut recorder = self.recorder.lock();
        let now = (self.now_ms)();
        let mut subtest = Test::new(recorder.job_id, name, now);
        subtest.status = olc_core::TestStatus::Done;
        subtest.result = result;
        subtest.cause = cause;
        subtest.ended_at_ms = Some(now);
        recorder.add_subtest(subtest);
    }

    /// Ask for the device(s) to be released dirty (reboot required).
    pub fn request_reboot(&self) {
        self.need_reboot.store(true, Ordering::SeqCst);
    }

    pub fn reboot_requested(&self) -> bool {
        self.need_reboot.load(Ordering::SeqCst)
    }

    /// A context over the same recorder restricted to one subdevice.
    pub fn for_subdevice(&self, index: usize) -> Self {
        let mut ctx = self.clone();
        if let Some(device) = self.devices.get(index) {
            ctx.devices = vec![device.clone()];
        }
        ctx
    }
}

/// The execution unit at the center of a chain.
#[async_trait]
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &TestContext) -> Result<TestResult, InfraError>;
}

/// Continuation handed to a decorator: the rest of the chain.
pub struct Next<'a> {
    chain: &'a DriverChain,
    index: usize,
}

impl<'a> Next<'a> {
    pub async fn run(self, ctx: &TestContext) -> Result<TestResult, InfraError> {
        self.chain.run_from(self.index, ctx).await
    }
}

/// Wraps the rest of the chain with pre/post steps.
///
/// A decorator that does not call `next.run` skips the driver entirely;
/// one that catches the inner error can translate results.
#[async_trait]
pub trait Decorator: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &TestContext, next: Next<'_>) -> Result<TestResult, InfraError>;
}

/// A driver with its decorators, nested outermost-first.
#[derive(Clone)]
pub struct DriverChain {
    decorators: Vec<Arc<dyn Decorator>>,
    driver: Arc<dyn Driver>,
}

impl std::fmt::Debug for DriverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverChain")
            .field(
                "decorators",
                &self.decorators.iter().map(|d| d.name()).collect::<Vec<_>>(),
            )
            .field("driver", &self.driver.name())
            .finish()
    }
}

impl DriverChain {
    pub fn new(decorators: Vec<Arc<dyn Decorator>>, driver: Arc<dyn Driver>) -> Self {
        Self { decorators, driver }
    }

    pub async fn run(&self, ctx: &TestContext) -> Result<TestResult, InfraError> {
        self.run_from(0, ctx).await
    }

    fn run_from<'a>(
        &'a self,
        index: usize,
        ctx: &'a TestContext,
    ) -> BoxFuture<'a, Result<TestResult, InfraError>> {
        Box::pin(async move {
            match self.decorators.get(index) {
                Some(decorator) => {
                    let next = Next { chain: self, index: index + 1 };
                    decorator.run(ctx, next).await
                }
                None => self.driver.run(ctx).await,
            }
        })
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
