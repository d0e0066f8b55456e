// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler: matches queued allocation requests to idle devices.
//!
//! Single-threaded event consumer over a bounded queue. All allocation
//! bookkeeping lives here; device status flows in as events from the
//! manager, allocation decisions flow out as oneshot replies to the job
//! runner. Two requests can never both claim the same device because only
//! this loop mutates the idle index.

use crate::manager::DeviceManager;
use olc_core::{
    matches, Allocation, AllocationExitStrategy, Clock, DeviceEvent, DeviceId, DeviceInfo,
    DeviceSelectionOptions, DeviceStatus, DimensionSet, ErrorId, InfraError, JobId, TestId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Command queue capacity; submitters back-pressure when the loop is busy.
const COMMAND_CAPACITY: usize = 256;

/// One request for devices, carried from the job runner to the scheduler.
#[derive(Debug, Clone)]
pub struct AllocationRequest {
    pub test_id: TestId,
    pub job_id: JobId,
    pub device_type: String,
    pub driver: String,
    pub decorators: Vec<String>,
    pub selection: DeviceSelectionOptions,
    pub dimensions: DimensionSet,
    /// Devices needed; N ≥ 2 builds an ad-hoc testbed.
    pub device_count: u32,
    pub priority: u32,
    pub exit_strategy: AllocationExitStrategy,
}

enum Command {
    Submit {
        request: AllocationRequest,
        reply: oneshot::Sender<Result<Allocation, InfraError>>,
    },
    CancelTest {
        test_id: TestId,
    },
    Release {
        allocation: Allocation,
        dirty: bool,
    },
}

/// Cloneable handle for talking to the scheduler loop.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Command>,
}

impl SchedulerHandle {
    /// Queue an allocation request; await the returned receiver for the
    /// allocation (or an `ALLOCATION_ABORTED` failure).
    ///
    /// Dropping the receiver does not dequeue the request — pair it with
    /// [`Self::cancel_test`].
    pub async fn submit(
        &self,
        request: AllocationRequest,
    ) -> Result<oneshot::Receiver<Result<Allocation, InfraError>>, InfraError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Submit { request, reply })
            .await
            .map_err(|_| InfraError::new(ErrorId::Internal, "scheduler is not running"))?;
        Ok(rx)
    }

    /// Drop any queued request for `test_id`. Idempotent.
    pub async fn cancel_test(&self, test_id: TestId) {
        let _ = self.tx.send(Command::CancelTest { test_id }).await;
    }

    /// Return an allocation's devices to the pool.
    pub async fn release(&self, allocation: Allocation, dirty: bool) {
        let _ = self.tx.send(Command::Release { allocation, dirty }).await;
    }
}

struct QueuedRequest {
    request: AllocationRequest,
    reply: oneshot::Sender<Result<Allocation, InfraError>>,
    submitted_at_ms: u64,
    seq: u64,
}

struct Scheduler<C: Clock> {
    manager: Arc<DeviceManager<C>>,
    clock: C,
    /// Pending requests, kept sorted: priority desc, submit time asc, seq asc.
    queue: Vec<QueuedRequest>,
    /// Idle devices eligible for matching.
    idle: HashMap<DeviceId, DeviceInfo>,
    /// Devices bound to a live allocation.
    allocated: HashMap<DeviceId, TestId>,
    /// LRU bookkeeping: allocation tick a device was last used at.
    last_used: HashMap<DeviceId, u64>,
    tick: u64,
    next_seq: u64,
}

/// Spawn the scheduler loop over the given device manager.
pub fn spawn<C: Clock + 'static>(
    manager: Arc<DeviceManager<C>>,
    clock: C,
    cancel: CancellationToken,
) -> (SchedulerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    let events = manager.subscribe();
    let scheduler = Scheduler {
        manager,
        clock,
        queue: Vec::new(),
        idle: HashMap::new(),
        allocated: HashMap::new(),
        last_used: HashMap::new(),
        tick: 0,
        next_seq: 0,
    };
    let handle = SchedulerHandle { tx };
    let task = tokio::spawn(scheduler.run(rx, events, cancel));
    (handle, task)
}

impl<C: Clock> Scheduler<C> {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<Command>,
        mut events: broadcast::Receiver<DeviceEvent>,
        cancel: CancellationToken,
    ) {
        self.resync();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                command = rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "scheduler lagged behind device events, resyncing");
                        self.resync();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
            self.match_pass();
        }
        debug!("scheduler stopped");
    }

    /// Rebuild the idle index from a manager snapshot.
    fn resync(&mut self) {
        self.idle.clear();
        for device in self.manager.snapshot() {
            if device.status == DeviceStatus::Idle
                && !self.allocated.contains_key(&device.control_id)
            {
                self.idle.insert(device.control_id.clone(), device);
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Submit { request, reply } => {
                debug!(test = %request.test_id, priority = request.priority, "allocation request queued");
                let queued = QueuedRequest {
                    request,
                    reply,
                    submitted_at_ms: self.clock.epoch_ms(),
                    seq: self.next_seq,
                };
                self.next_seq += 1;
                self.queue.push(queued);
                self.queue.sort_by(|a, b| {
                    b.request
                        .priority
                        .cmp(&a.request.priority)
                        .then(a.submitted_at_ms.cmp(&b.submitted_at_ms))
                        .then(a.seq.cmp(&b.seq))
                });
            }
            Command::CancelTest { test_id } => {
                self.queue.retain(|q| q.request.test_id != test_id);
            }
            Command::Release { allocation, dirty } => {
                for device in &allocation.devices {
                    if self.allocated.remove(device).is_none() {
                        debug!(device = %device, "release for device with no live allocation");
                        continue;
                    }
                    self.manager.release(device, dirty);
                }
            }
        }
    }

    fn handle_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Up { device } => {
                if device.status == DeviceStatus::Idle {
                    self.idle.insert(device.control_id.clone(), device);
                }
            }
            DeviceEvent::Down { id } => {
                self.idle.remove(&id);
                self.last_used.remove(&id);
            }
            DeviceEvent::StatusChanged { id, status } => {
                if status == DeviceStatus::Idle && !self.allocated.contains_key(&id) {
                    if let Some(runner) = self.manager.runner(&id) {
                        self.idle.insert(id, runner.snapshot());
                    }
                } else {
                    self.idle.remove(&id);
                }
            }
        }
    }

    /// Walk the queue head-to-tail, matching requests against idle devices.
    fn match_pass(&mut self) {
        let mut i = 0;
        while i < self.queue.len() {
            // Receiver gone: the runner stopped waiting; drop silently.
            if self.queue[i].reply.is_closed() {
                self.queue.remove(i);
                continue;
            }

            if self.idle.is_empty() {
                if self.queue[i].request.exit_strategy == AllocationExitStrategy::FailFastNoIdle {
                    let queued = self.queue.remove(i);
                    info!(test = %queued.request.test_id, "fail-fast: no idle device");
                    let _ = queued.reply.send(Err(InfraError::new(
                        ErrorId::AllocationAborted,
                        "no idle device available",
                    )));
                    continue;
                }
                i += 1;
                continue;
            }

            match self.pick_devices(&self.queue[i].request) {
                Some(devices) => {
                    let queued = self.queue.remove(i);
                    let allocation = self.allocate(&queued.request, devices);
                    let _ = queued.reply.send(Ok(allocation));
                }
                None => i += 1,
            }
        }
    }

    /// Choose `device_count` matching idle devices, least recently used
    /// first. None when not enough devices match.
    fn pick_devices(&self, request: &AllocationRequest) -> Option<Vec<DeviceId>> {
        let mut candidates: Vec<&DeviceInfo> = self
            .idle
            .values()
            .filter(|d| self.device_fits(d, request))
            .collect();
        if candidates.len() < request.device_count as usize {
            return None;
        }
        candidates.sort_by(|a, b| {
            let a_used = self.last_used.get(&a.control_id).copied().unwrap_or(0);
            let b_used = self.last_used.get(&b.control_id).copied().unwrap_or(0);
            a_used.cmp(&b_used).then(a.control_id.cmp(&b.control_id))
        });
        Some(
            candidates
                .into_iter()
                .take(request.device_count as usize)
                .map(|d| d.control_id.clone())
                .collect(),
        )
    }

    fn device_fits(&self, device: &DeviceInfo, request: &AllocationRequest) -> bool {
        device.types.iter().any(|t| t == &request.device_type)
            && device.supports_driver(&request.driver)
            && device.supports_decorators(&request.decorators)
            && device.dimensions.satisfies(&request.dimensions)
            && matches(device, &request.selection)
    }

    fn allocate(&mut self, request: &AllocationRequest, devices: Vec<DeviceId>) -> Allocation {
        self.tick += 1;
        for device in &devices {
            self.idle.remove(device);
            self.allocated.insert(device.clone(), request.test_id);
            self.last_used.insert(device.clone(), self.tick);
            self.manager.set_status(device, DeviceStatus::Busy);
        }
        info!(
            test = %request.test_id,
            devices = ?devices.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
            "allocation created"
        );
        Allocation::new(request.test_id, devices, self.clock.epoch_ms())
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
