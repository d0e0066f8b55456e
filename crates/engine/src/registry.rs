// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compiled-in driver/decorator registry.
//!
//! No runtime discovery: everything executable is registered here by name,
//! either at build time (builtins) or by the composition root.

use crate::driver::{Decorator, Driver, DriverChain, Next, TestContext};
use async_trait::async_trait;
use olc_core::{ErrorId, InfraError, JobType, TestResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Name → implementation tables for drivers and decorators.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
    decorators: HashMap<String, Arc<dyn Decorator>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in execution units.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register_driver(Arc::new(NoopDriver));
        registry.register_driver(Arc::new(SleepDriver));
        registry.register_decorator(Arc::new(TimingDecorator));
        registry
    }

    pub fn register_driver(&mut self, driver: Arc<dyn Driver>) {
        self.drivers.insert(driver.name().to_string(), driver);
    }

    pub fn register_decorator(&mut self, decorator: Arc<dyn Decorator>) {
        self.decorators.insert(decorator.name().to_string(), decorator);
    }

    pub fn driver(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.get(name).cloned()
    }

    pub fn decorator(&self, name: &str) -> Option<Arc<dyn Decorator>> {
        self.decorators.get(name).cloned()
    }

    /// Resolve a job type into an executable chain.
    pub fn chain_for(&self, job_type: &JobType) -> Result<DriverChain, InfraError> {
        let driver = self.driver(&job_type.driver).ok_or_else(|| {
            InfraError::new(ErrorId::NotFound, format!("unknown driver {:?}", job_type.driver))
        })?;
        let decorators = self.decorators_for(job_type)?;
        Ok(DriverChain::new(decorators, driver))
    }

    /// Resolve just the decorator list, outermost-first.
    pub fn decorators_for(&self, job_type: &JobType) -> Result<Vec<Arc<dyn Decorator>>, InfraError> {
        job_type
            .decorators
            .iter()
            .map(|name| {
                self.decorator(name).ok_or_else(|| {
                    InfraError::new(ErrorId::NotFound, format!("unknown decorator {name:?}"))
                })
            })
            .collect()
    }
}

/// Driver that immediately passes. Baseline for wiring tests.
pub struct NoopDriver;

#[async_trait]
impl Driver for NoopDriver {
    fn name(&self) -> &str {
        "noop"
    }

    async fn run(&self, ctx: &TestContext) -> Result<TestResult, InfraError> {
        ctx.log("noop driver executed");
        Ok(TestResult::Pass)
    }
}

/// Driver that sleeps for `sleep_ms` (default 1000), honoring cancellation.
pub struct SleepDriver;

#[async_trait]
impl Driver for SleepDriver {
    fn name(&self) -> &str {
        "sleep"
    }

    async fn run(&self, ctx: &TestContext) -> Result<TestResult, InfraError> {
        let ms = ctx.param("sleep_ms").and_then(|v| v.parse().ok()).unwrap_or(1_000);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(TestResult::Pass),
            _ = ctx.cancel.cancelled() => {
                Err(InfraError::new(ErrorId::Cancelled, "sleep driver interrupted"))
            }
        }
    }
}

/// Decorator recording wall-clock duration of the wrapped chain as a test
/// property.
pub struct TimingDecorator;

#[async_trait]
impl Decorator for TimingDecorator {
    fn name(&self) -> &str {
        "timing"
    }

    async fn run(&self, ctx: &TestContext, next: Next<'_>) -> Result<TestResult, InfraError> {
        let start = std::time::Instant::now();
        let result = next.run(ctx).await;
        ctx.set_property("elapsed_ms", start.elapsed().as_millis().to_string());
        result
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
