// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job specification: driver/decorator selection, timeouts, retry, priority.

use crate::dimension::DimensionSet;
use crate::error::{ErrorId, InfraError};
use crate::selection::DeviceSelectionOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Unique identifier for a job.
    ///
    /// Jobs are created by session plugins and owned by exactly one session.
    pub struct JobId("job-");
}

/// What to run: a driver plus the decorators wrapped around it,
/// against devices of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobType {
    pub driver: String,
    pub device_type: String,
    /// Decorator names, outermost first. The last entry wraps the driver
    /// directly.
    #[serde(default)]
    pub decorators: Vec<String>,
}

impl JobType {
    pub fn new(driver: impl Into<String>, device_type: impl Into<String>) -> Self {
        Self { driver: driver.into(), device_type: device_type.into(), decorators: Vec::new() }
    }

    pub fn with_decorators(mut self, decorators: Vec<String>) -> Self {
        self.decorators = decorators;
        self
    }
}

/// What to do when no idle device is available for an allocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationExitStrategy {
    /// Keep the request queued until a device frees up.
    #[default]
    Normal,
    /// Fail the request immediately when it reaches the queue head and the
    /// idle pool is empty.
    FailFastNoIdle,
}

crate::simple_display! {
    AllocationExitStrategy {
        Normal => "normal",
        FailFastNoIdle => "fail_fast_no_idle",
    }
}

/// Retry policy for a job's tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per test (1 = no retry).
    pub test_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { test_attempts: 1 }
    }
}

/// Timeouts, retry, priority, and allocation strategy for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSetting {
    /// Budget for device allocation before the first test starts.
    pub start_timeout_ms: u64,
    /// Budget for a single test execution.
    pub test_timeout_ms: u64,
    /// Budget for the whole job.
    pub overall_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Higher runs first.
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub exit_strategy: AllocationExitStrategy,
}

impl Default for JobSetting {
    fn default() -> Self {
        Self {
            start_timeout_ms: 60_000,
            test_timeout_ms: 300_000,
            overall_timeout_ms: 3_600_000,
            retry: RetryPolicy::default(),
            priority: 0,
            exit_strategy: AllocationExitStrategy::Normal,
        }
    }
}

impl JobSetting {
    /// A job must be able to allocate and run at least one test inside its
    /// overall budget.
    pub fn validate(&self) -> Result<(), InfraError> {
        if self.overall_timeout_ms < self.test_timeout_ms + self.start_timeout_ms {
            return Err(InfraError::new(
                ErrorId::InvalidArgument,
                format!(
                    "overall timeout {}ms < test timeout {}ms + start timeout {}ms",
                    self.overall_timeout_ms, self.test_timeout_ms, self.start_timeout_ms
                ),
            ));
        }
        if self.retry.test_attempts == 0 {
            return Err(InfraError::new(ErrorId::InvalidArgument, "test_attempts must be >= 1"));
        }
        Ok(())
    }
}

/// Immutable specification of one job.
///
/// A job names its driver chain, its device requirements, and the tests to
/// run; the engine owns the mutable per-test state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: JobId,
    pub name: String,
    /// Owning user, from client metadata.
    #[serde(default)]
    pub user: String,
    pub job_type: JobType,
    pub setting: JobSetting,
    /// Device selection filters applied by the scheduler.
    #[serde(default)]
    pub selection: DeviceSelectionOptions,
    /// Dimensions the matched device must declare as supported.
    #[serde(default)]
    pub dimensions: DimensionSet,
    /// Free-form driver parameters.
    #[serde(default)]
    pub params: HashMap<String, String>,
    /// Test names; one test record is created per entry.
    pub test_names: Vec<String>,
    /// Devices per test. 1 for plain tests; N ≥ 2 runs each test on an
    /// ad-hoc testbed coordinated by the barrier.
    #[serde(default = "default_device_count")]
    pub device_count: u32,
}

fn default_device_count() -> u32 {
    1
}

impl JobSpec {
    /// Validate the spec at the wire/plugin boundary. Runs exactly once;
    /// the engine assumes specs it receives are valid.
    pub fn validate(&self) -> Result<(), InfraError> {
        if self.name.is_empty() {
            return Err(InfraError::new(ErrorId::InvalidArgument, "job name is empty"));
        }
        if self.job_type.driver.is_empty() {
            return Err(InfraError::new(ErrorId::InvalidArgument, "driver name is empty"));
        }
        if self.test_names.is_empty() {
            return Err(InfraError::new(ErrorId::InvalidArgument, "job has no tests"));
        }
        if self.device_count == 0 {
            return Err(InfraError::new(ErrorId::InvalidArgument, "device_count must be >= 1"));
        }
        self.setting.validate()?;
        self.selection.validate()?;
        Ok(())
    }
}

crate::builder! {
    pub struct JobSpecBuilder => JobSpec {
        into {
            name: String = "test-job",
            user: String = "",
        }
        set {
            id: JobId = JobId::generate(),
            job_type: JobType = JobType::new("noop", "android_real"),
            setting: JobSetting = JobSetting::default(),
            selection: DeviceSelectionOptions = DeviceSelectionOptions::default(),
            dimensions: DimensionSet = DimensionSet::default(),
            params: HashMap<String, String> = HashMap::new(),
            test_names: Vec<String> = vec!["t1".to_string()],
            device_count: u32 = 1,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
