// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job runner: drives one job's tests from allocation to result.
//!
//! Tests run sequentially in declaration order. Each attempt gets a fresh
//! allocation; the internal allocation-releaser handler (registered before
//! any API subscriber) returns devices to the scheduler when a test
//! execution ends.

use crate::bus::{JobEventBus, JobEventHandler};
use crate::driver::{Decorator, Driver, DriverChain, TestContext};
use crate::registry::DriverRegistry;
use crate::testbed;
use olc_core::{
    Clock, ErrorId, ErrorRecord, InfraError, JobEvent, JobId, JobSpec, Test, TestResult,
    TestStatus,
};
use olc_device::{AllocationRequest, DeviceManager, SchedulerHandle};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Final state of a completed job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: JobId,
    /// One record per test attempt, in execution order.
    pub tests: Vec<Test>,
    /// First infrastructure error, when any attempt ended in
    /// `Error`/`Timeout`.
    pub error: Option<ErrorRecord>,
}

/// Runs one job to completion.
pub struct JobRunner<C: Clock> {
    spec: JobSpec,
    scheduler: SchedulerHandle,
    manager: Arc<DeviceManager<C>>,
    registry: Arc<DriverRegistry>,
    bus: Arc<JobEventBus>,
    clock: C,
    cancel: CancellationToken,
}

impl<C: Clock + 'static> JobRunner<C> {
    pub fn new(
        spec: JobSpec,
        scheduler: SchedulerHandle,
        manager: Arc<DeviceManager<C>>,
        registry: Arc<DriverRegistry>,
        clock: C,
        cancel: CancellationToken,
    ) -> Self {
        let bus = Arc::new(JobEventBus::new());
        // Internal handlers first: the releaser must see execution-ended
        // events before any API subscriber.
        bus.register(
            "allocation-releaser",
            Arc::new(AllocationReleaser { scheduler: scheduler.clone() }),
        );
        Self { spec, scheduler, manager, registry, bus, clock, cancel }
    }

    /// Bus for this job; subscribe/register before calling [`Self::run`].
    pub fn bus(&self) -> Arc<JobEventBus> {
        Arc::clone(&self.bus)
    }

    pub fn job_id(&self) -> JobId {
        self.spec.id
    }

    /// Drive every test to a terminal state and return the outcome.
    pub async fn run(self) -> JobOutcome {
        let job_id = self.spec.id;
        info!(job = %job_id, name = %self.spec.name, "job starting");
        self.bus.publish(JobEvent::JobStarting { job_id });

        let deadline = self.clock.now() + Duration::from_millis(self.spec.setting.overall_timeout_ms);
        let mut tests: Vec<Test> = Vec::new();
        let mut job_error: Option<ErrorRecord> = None;

        match self.resolve_chain() {
            Ok((driver, decorators)) => {
                for name in self.spec.test_names.clone() {
                    self.run_test(&name, &driver, &decorators, deadline, &mut tests).await;
                }
            }
            Err(e) => {
                // Unresolvable chain fails every test without allocation.
                warn!(job = %job_id, error = %e, "driver chain unresolvable");
                let record = ErrorRecord::from(&e);
                for name in self.spec.test_names.clone() {
                    let mut test = Test::new(job_id, &name, self.clock.epoch_ms());
                    test.result = TestResult::Error;
                    test.cause = Some(record.clone());
                    test.advance(TestStatus::Done, self.clock.epoch_ms());
                    self.bus.publish(JobEvent::TestEnded { job_id, test: test.clone() });
                    tests.push(test);
                }
            }
        }

        for test in &tests {
            if matches!(test.result, TestResult::Error | TestResult::Timeout) {
                job_error = Some(test.cause.clone().unwrap_or_else(|| {
                    ErrorRecord::new(ErrorId::Internal, format!("test {} failed", test.name))
                }));
                break;
            }
        }

        info!(job = %job_id, tests = tests.len(), error = job_error.is_some(), "job ended");
        self.bus.publish(JobEvent::JobEnded { job_id, error: job_error.clone() });
        JobOutcome { job_id, tests, error: job_error }
    }

    fn resolve_chain(&self) -> Result<(Arc<dyn Driver>, Vec<Arc<dyn Decorator>>), InfraError> {
        let driver = self.registry.driver(&self.spec.job_type.driver).ok_or_else(|| {
            InfraError::new(
                ErrorId::NotFound,
                format!("unknown driver {:?}", self.spec.job_type.driver),
            )
        })?;
        let decorators = self.registry.decorators_for(&self.spec.job_type)?;
        Ok((driver, decorators))
    }

    /// Run one named test through its retry budget.
    async fn run_test(
        &self,
        name: &str,
        driver: &Arc<dyn Driver>,
        decorators: &[Arc<dyn Decorator>],
        deadline: Instant,
        tests: &mut Vec<Test>,
    ) {
        let attempts = self.spec.setting.retry.test_attempts;
        for attempt in 1..=attempts {
            let recorder = Arc::new(Mutex::new(Test::new(
                self.spec.id,
                name,
                self.clock.epoch_ms(),
            )));
            recorder.lock().attempts = attempt;

            if self.cancel.is_cancelled() {
                let mut test = recorder.lock();
                test.result = TestResult::Skip;
                test.advance(TestStatus::Done, self.clock.epoch_ms());
            } else {
                self.run_attempt(&recorder, driver, decorators, deadline).await;
            }

            let test = recorder.lock().clone();
            self.bus.publish(JobEvent::TestEnded { job_id: self.spec.id, test: test.clone() });
            let retryable = matches!(test.result, TestResult::Fail | TestResult::Error)
                && test.status != TestStatus::Suspended;
            tests.push(test);

            if !retryable || attempt == attempts || self.cancel.is_cancelled() {
                return;
            }
            debug!(test = name, attempt, "retrying with a fresh allocation");
        }
    }

    /// One attempt: allocate, execute, publish the execution-ended event.
    async fn run_attempt(
        &self,
        recorder: &Arc<Mutex<Test>>,
        driver: &Arc<dyn Driver>,
        decorators: &[Arc<dyn Decorator>],
        deadline: Instant,
    ) {
        let job_id = self.spec.id;
        let (test_id, test_name) = {
            let mut test = recorder.lock();
            test.advance(TestStatus::WaitingAllocation, self.clock.epoch_ms());
            (test.id, test.name.clone())
        };

        let request = AllocationRequest {
            test_id,
            job_id,
            device_type: self.spec.job_type.device_type.clone(),
            driver: self.spec.job_type.driver.clone(),
            decorators: self.spec.job_type.decorators.clone(),
            selection: self.spec.selection.clone(),
            dimensions: self.spec.dimensions.clone(),
            device_count: self.spec.device_count,
            priority: self.spec.setting.priority,
            exit_strategy: self.spec.setting.exit_strategy,
        };

        let rx = match self.scheduler.submit(request).await {
            Ok(rx) => rx,
            Err(e) => {
                self.fail(recorder, TestResult::Error, ErrorRecord::from(&e));
                return;
            }
        };

        let start_budget = Duration::from_millis(self.spec.setting.start_timeout_ms)
            .min(deadline.saturating_duration_since(self.clock.now()));
        let allocation = tokio::select! {
            reply = rx => match reply {
                Ok(Ok(allocation)) => allocation,
                Ok(Err(e)) => {
                    self.fail(recorder, TestResult::Error, ErrorRecord::from(&e));
                    return;
                }
                Err(_) => {
                    self.fail(
                        recorder,
                        TestResult::Error,
                        ErrorRecord::new(ErrorId::Internal, "scheduler dropped the request"),
                    );
                    return;
                }
            },
            _ = self.cancel.cancelled() => {
                // Cancelled before any device was bound: skip quietly.
                self.scheduler.cancel_test(test_id).await;
                let mut test = recorder.lock();
                test.result = TestResult::Skip;
                test.advance(TestStatus::Done, self.clock.epoch_ms());
                return;
            }
            _ = tokio::time::sleep(start_budget) => {
                self.scheduler.cancel_test(test_id).await;
                self.fail(
                    recorder,
                    TestResult::Error,
                    ErrorRecord::new(ErrorId::Timeout, "device allocation timed out"),
                );
                return;
            }
        };

        recorder.lock().advance(TestStatus::Assigned, self.clock.epoch_ms());
        self.bus.publish(JobEvent::TestStarting {
            job_id,
            test_id,
            name: test_name.clone(),
            allocation: allocation.clone(),
        });

        let devices: Vec<_> = allocation
            .devices
            .iter()
            .filter_map(|id| self.manager.runner(id).map(|r| r.snapshot()))
            .collect();
        let test_cancel = self.cancel.child_token();
        let clock = self.clock.clone();
        let ctx = TestContext::new(
            self.spec.params.clone(),
            allocation.clone(),
            devices,
            test_cancel.clone(),
            Arc::clone(recorder),
            Arc::new(move || clock.epoch_ms()),
        );

        recorder.lock().advance(TestStatus::Running, self.clock.epoch_ms());
        let budget = Duration::from_millis(self.spec.setting.test_timeout_ms)
            .min(deadline.saturating_duration_since(self.clock.now()));

        let outcome = tokio::select! {
            result = self.execute(driver, decorators, &ctx, budget) => Some(result),
            _ = self.cancel.cancelled() => None,
            _ = tokio::time::sleep(budget) => {
                Some(Err(InfraError::new(ErrorId::Timeout, "test execution timed out")))
            }
        };

        let (result, dirty) = match outcome {
            // Cancelled mid-run: suspend and release dirty (the driver was
            // interrupted, device state is unknown).
            None => {
                test_cancel.cancel();
                let mut test = recorder.lock();
                test.result = TestResult::Skip;
                test.advance(TestStatus::Suspended, self.clock.epoch_ms());
                (TestResult::Skip, true)
            }
            Some(Ok(result)) => {
                let mut test = recorder.lock();
                test.result = result;
                test.advance(TestStatus::Done, self.clock.epoch_ms());
                (result, ctx.reboot_requested())
            }
            Some(Err(e)) => {
                let result = match e.id() {
                    ErrorId::Timeout => TestResult::Timeout,
                    ErrorId::Cancelled => TestResult::Skip,
                    _ => TestResult::Error,
                };
                let dirty = result == TestResult::Timeout || ctx.reboot_requested();
                let mut test = recorder.lock();
                test.log_line(&format!("execution failed: {e}"));
                test.result = result;
                test.cause = Some(ErrorRecord::from(&e));
                let next_status = if result == TestResult::Skip {
                    TestStatus::Suspended
                } else {
                    TestStatus::Done
                };
                test.advance(next_status, self.clock.epoch_ms());
                (result, dirty)
            }
        };

        self.bus.publish(JobEvent::TestExecutionEnded {
            job_id,
            allocation,
            result,
            need_reboot: dirty,
        });
    }

    async fn execute(
        &self,
        driver: &Arc<dyn Driver>,
        decorators: &[Arc<dyn Decorator>],
        ctx: &TestContext,
        budget: Duration,
    ) -> Result<TestResult, InfraError> {
        if ctx.allocation.is_testbed() {
            testbed::run_testbed(decorators.to_vec(), Arc::clone(driver), ctx, budget).await
        } else {
            let chain = DriverChain::new(decorators.to_vec(), Arc::clone(driver));
            chain.run(ctx).await
        }
    }

    /// Terminal failure without an execution (allocation never bound).
    fn fail(&self, recorder: &Arc<Mutex<Test>>, result: TestResult, cause: ErrorRecord) {
        let mut test = recorder.lock();
        test.log_line(&format!("{cause}"));
        test.result = result;
        test.cause = Some(cause);
        test.advance(TestStatus::Done, self.clock.epoch_ms());
    }
}

/// Internal bus handler that returns devices to the scheduler.
struct AllocationReleaser {
    scheduler: SchedulerHandle,
}

impl JobEventHandler for AllocationReleaser {
    fn handle(&self, event: &JobEvent) -> Result<(), InfraError> {
        if let JobEvent::TestExecutionEnded { allocation, need_reboot, .. } = event {
            let scheduler = self.scheduler.clone();
            let allocation = allocation.clone();
            let dirty = *need_reboot;
            tokio::spawn(async move {
                scheduler.release(allocation, dirty).await;
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
