// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed event families.
//!
//! One enum per event family, each with its own channel: session lifecycle
//! events delivered to plugins, job/test execution events on the per-job
//! bus, and device change events from the manager.

use crate::allocation::Allocation;
use crate::device::{DeviceId, DeviceInfo, DeviceStatus};
use crate::error::ErrorRecord;
use crate::job::JobId;
use crate::session::SessionResult;
use crate::test::{Test, TestId, TestResult};
use serde::{Deserialize, Serialize};

/// Events delivered to a session's plugins, in strict FIFO order.
///
/// Every session sees exactly one `Starting` and exactly one `Ended`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// Delivered once; plugins register jobs here.
    #[serde(rename = "session:starting")]
    Starting,

    /// An opaque signal from outside (e.g. `CANCEL_SESSION`).
    #[serde(rename = "session:notification")]
    Notification { payload: String },

    #[serde(rename = "session:test_starting")]
    TestStarting { job_id: JobId, test_id: TestId, name: String },

    #[serde(rename = "session:test_ended")]
    TestEnded { job_id: JobId, test: Test },

    #[serde(rename = "session:job_ended")]
    JobEnded {
        job_id: JobId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorRecord>,
    },

    /// Delivered once; plugins finalize outputs here.
    #[serde(rename = "session:ended")]
    Ended { result: SessionResult },
}

impl SessionEvent {
    pub fn name(&self) -> &str {
        match self {
            SessionEvent::Starting => "session:starting",
            SessionEvent::Notification { .. } => "session:notification",
            SessionEvent::TestStarting { .. } => "session:test_starting",
            SessionEvent::TestEnded { .. } => "session:test_ended",
            SessionEvent::JobEnded { .. } => "session:job_ended",
            SessionEvent::Ended { .. } => "session:ended",
        }
    }

    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            SessionEvent::Notification { payload } => format!("{t} payload={payload}"),
            SessionEvent::TestStarting { job_id, test_id, name } => {
                format!("{t} job={job_id} test={test_id} name={name}")
            }
            SessionEvent::TestEnded { job_id, test } => {
                format!("{t} job={job_id} test={} result={}", test.id, test.result)
            }
            SessionEvent::JobEnded { job_id, error } => match error {
                Some(e) => format!("{t} job={job_id} error={e}"),
                None => format!("{t} job={job_id}"),
            },
            SessionEvent::Ended { result } => format!("{t} result={result}"),
            SessionEvent::Starting => t.to_string(),
        }
    }
}

/// Events published on a per-job bus while the job runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JobEvent {
    #[serde(rename = "job:starting")]
    JobStarting { job_id: JobId },

    #[serde(rename = "job:test_starting")]
    TestStarting { job_id: JobId, test_id: TestId, name: String, allocation: Allocation },

    /// A test execution finished; the handler releases the allocation.
    #[serde(rename = "job:test_execution_ended")]
    TestExecutionEnded {
        job_id: JobId,
        allocation: Allocation,
        result: TestResult,
        /// Device must be rebooted / released dirty.
        need_reboot: bool,
    },

    #[serde(rename = "job:test_ended")]
    TestEnded { job_id: JobId, test: Test },

    #[serde(rename = "job:ended")]
    JobEnded {
        job_id: JobId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorRecord>,
    },
}

impl JobEvent {
    pub fn name(&self) -> &str {
        match self {
            JobEvent::JobStarting { .. } => "job:starting",
            JobEvent::TestStarting { .. } => "job:test_starting",
            JobEvent::TestExecutionEnded { .. } => "job:test_execution_ended",
            JobEvent::TestEnded { .. } => "job:test_ended",
            JobEvent::JobEnded { .. } => "job:ended",
        }
    }

    pub fn job_id(&self) -> &JobId {
        match self {
            JobEvent::JobStarting { job_id }
            | JobEvent::TestStarting { job_id, .. }
            | JobEvent::TestExecutionEnded { job_id, .. }
            | JobEvent::TestEnded { job_id, .. }
            | JobEvent::JobEnded { job_id, .. } => job_id,
        }
    }
}

/// Device population changes from the manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DeviceEvent {
    #[serde(rename = "device:up")]
    Up { device: DeviceInfo },

    #[serde(rename = "device:down")]
    Down { id: DeviceId },

    #[serde(rename = "device:status")]
    StatusChanged { id: DeviceId, status: DeviceStatus },
}

impl DeviceEvent {
    pub fn name(&self) -> &str {
        match self {
            DeviceEvent::Up { .. } => "device:up",
            DeviceEvent::Down { .. } => "device:down",
            DeviceEvent::StatusChanged { .. } => "device:status",
        }
    }

    pub fn device_id(&self) -> &DeviceId {
        match self {
            DeviceEvent::Up { device } => &device.control_id,
            DeviceEvent::Down { id } | DeviceEvent::StatusChanged { id, .. } => id,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
