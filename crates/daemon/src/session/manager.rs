// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session manager: owns session objects, runs their lifecycle, dispatches
//! events to plugins, and serves queries.
//!
//! Every session gets its own single-consumer dispatcher task; everything
//! its plugins observe flows through that task in strict FIFO order. The
//! manager enforces the running-session cap, keeps finished sessions
//! queryable for the retention window, and tracks live jobs for forced
//! eviction.

use crate::logmgr::LogManager;
use crate::session::plugin::{PluginRegistry, SessionHandle, SessionPlugin};
use olc_core::{
    Clock, ErrorId, ErrorRecord, InfraError, JobEvent, JobId, LogLevel, LogRecord, SessionConfig,
    SessionDetail, SessionEvent, SessionId, SessionResult, SessionState, TestId, CANCEL_SESSION,
};
use olc_device::{DeviceManager, SchedulerHandle};
use olc_engine::{DriverRegistry, JobEventHandler, JobRunner};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Commands consumed by one session's dispatcher task.
enum SessionCommand {
    /// Opaque notification from outside.
    Notify { payload: String },
    /// Event forwarded from a job runner's bus.
    Forward { event: SessionEvent },
}

/// Per-command queue depth for a session dispatcher.
const SESSION_QUEUE_CAPACITY: usize = 256;

/// Tuning for the manager.
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// How long finished sessions stay queryable.
    pub retention: Duration,
    /// Cap on concurrently running sessions; excess stays `Submitted`.
    pub max_running: usize,
    /// Per-session output blobs are written under here at finalize time.
    pub output_dir: PathBuf,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(24 * 60 * 60),
            max_running: 30,
            output_dir: std::env::temp_dir().join("olc-sessions"),
        }
    }
}

/// Everything a session manager needs from the composition root.
pub struct SessionManagerDeps<C: Clock> {
    pub plugins: PluginRegistry,
    pub drivers: Arc<DriverRegistry>,
    pub scheduler: SchedulerHandle,
    pub devices: Arc<DeviceManager<C>>,
    pub clock: C,
    pub config: SessionManagerConfig,
    /// Streamed to `GetLog` subscribers when present.
    pub logs: Option<LogManager>,
    /// Completed test ids, consumed by master sync for `close_test`.
    pub test_done_tx: Option<mpsc::Sender<TestId>>,
    pub cancel: CancellationToken,
}

struct SessionEntry {
    id: SessionId,
    detail: Arc<Mutex<SessionDetail>>,
    cancelled: Arc<AtomicBool>,
    cancel: CancellationToken,
    tx: mpsc::Sender<SessionCommand>,
    done: watch::Receiver<bool>,
}

struct RunningJob {
    session: SessionId,
    cancel: CancellationToken,
}

struct Inner<C: Clock> {
    sessions: RwLock<HashMap<SessionId, Arc<SessionEntry>>>,
    jobs: RwLock<HashMap<JobId, RunningJob>>,
    plugins: PluginRegistry,
    drivers: Arc<DriverRegistry>,
    scheduler: SchedulerHandle,
    devices: Arc<DeviceManager<C>>,
    clock: C,
    config: SessionManagerConfig,
    running_slots: Arc<Semaphore>,
    logs: Option<LogManager>,
    test_done_tx: Option<mpsc::Sender<TestId>>,
    cancel: CancellationToken,
}

/// Cloneable manager handle.
pub struct SessionManager<C: Clock> {
    inner: Arc<Inner<C>>,
}

impl<C: Clock> Clone for SessionManager<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<C: Clock + 'static> SessionManager<C> {
    pub fn new(deps: SessionManagerDeps<C>) -> Self {
        let running_slots = Arc::new(Semaphore::new(deps.config.max_running.max(1)));
        Self {
            inner: Arc::new(Inner {
                sessions: RwLock::new(HashMap::new()),
                jobs: RwLock::new(HashMap::new()),
                plugins: deps.plugins,
                drivers: deps.drivers,
                scheduler: deps.scheduler,
                devices: deps.devices,
                clock: deps.clock,
                config: deps.config,
                running_slots,
                logs: deps.logs,
                test_done_tx: deps.test_done_tx,
                cancel: deps.cancel,
            }),
        }
    }

    /// Create a session and start its lifecycle.
    ///
    /// Plugins are instantiated here so bad labels/configs fail the call
    /// instead of the session. Two identical configs produce two distinct
    /// sessions — creation is intentionally not idempotent.
    pub fn create_session(&self, config: SessionConfig) -> Result<SessionId, InfraError> {
        if self.inner.cancel.is_cancelled() {
            return Err(InfraError::new(ErrorId::PreconditionFailed, "daemon is shutting down"));
        }

        let mut plugins: Vec<(String, Box<dyn SessionPlugin>)> = Vec::new();
        for spec in &config.plugins {
            let plugin = self.inner.plugins.build(&spec.label, &spec.config)?;
            plugins.push((spec.label.clone(), plugin));
        }

        let id = SessionId::generate();
        let now = self.inner.clock.epoch_ms();
        let detail = Arc::new(Mutex::new(SessionDetail::new(id.clone(), &config.name, now)));
        let (tx, rx) = mpsc::channel(SESSION_QUEUE_CAPACITY);
        let (done_tx, done) = watch::channel(false);
        let entry = Arc::new(SessionEntry {
            id: id.clone(),
            detail,
            cancelled: Arc::new(AtomicBool::new(false)),
            cancel: self.inner.cancel.child_token(),
            tx,
            done,
        });

        self.inner.sessions.write().insert(id.clone(), Arc::clone(&entry));
        self.log_important(format!("session {id} created"));
        info!(session = %id, name = %config.name, "session created");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(session_task(inner, entry, plugins, rx, done_tx));
        Ok(id)
    }

    /// Latest detail snapshot for one session.
    pub fn detail(&self, id: &str) -> Option<SessionDetail> {
        self.inner.sessions.read().get(id).map(|e| e.detail.lock().clone())
    }

    /// Latest detail snapshots for all sessions.
    pub fn all_details(&self) -> Vec<SessionDetail> {
        let mut details: Vec<SessionDetail> =
            self.inner.sessions.read().values().map(|e| e.detail.lock().clone()).collect();
        details.sort_by_key(|d| d.created_at_ms);
        details
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.read().len()
    }

    /// Deliver an opaque notification to a session.
    ///
    /// `CANCEL_SESSION` additionally sets the sticky cancel flag and
    /// interrupts in-flight work; repeated cancels are no-ops.
    pub fn notify(&self, id: &str, payload: &str) -> Result<(), InfraError> {
        let entry = self
            .inner
            .sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| InfraError::new(ErrorId::NotFound, format!("no session {id}")))?;

        if payload == CANCEL_SESSION {
            let already = entry.cancelled.swap(true, Ordering::SeqCst);
            if !already {
                info!(session = %id, "session cancelled");
                self.log_important(format!("session {id} cancelled"));
                entry.cancel.cancel();
            }
        }
        // Forward to plugins; a finished session's dispatcher is gone and
        // the send is a silent no-op.
        let _ = entry.tx.try_send(SessionCommand::Notify { payload: payload.to_string() });
        Ok(())
    }

    /// Wait until a session finishes, up to `timeout`. Returns the latest
    /// detail either way.
    pub async fn wait(&self, id: &str, timeout: Option<Duration>) -> Option<SessionDetail> {
        let entry = self.inner.sessions.read().get(id).cloned()?;
        let mut done = entry.done.clone();
        let wait = done.wait_for(|finished| *finished);
        match timeout {
            Some(limit) => {
                let _ = tokio::time::timeout(limit, wait).await;
            }
            None => {
                let _ = wait.await;
            }
        }
        let detail = entry.detail.lock().clone();
        Some(detail)
    }

    /// Ids of jobs currently executing.
    pub fn running_job_ids(&self) -> Vec<JobId> {
        self.inner.jobs.read().keys().copied().collect()
    }

    /// Force-evict a job (e.g. the master declared it dead): cancels the
    /// job's work; its tests end suspended/skipped.
    pub fn evict_job(&self, job_id: &JobId) -> bool {
        let jobs = self.inner.jobs.read();
        match jobs.get(job_id) {
            Some(job) => {
                warn!(job = %job_id, session = %job.session, "force-evicting job");
                job.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel all sessions and wait for them to finish, up to `timeout`.
    pub async fn drain(&self, timeout: Duration) {
        let entries: Vec<Arc<SessionEntry>> =
            self.inner.sessions.read().values().cloned().collect();
        for entry in &entries {
            entry.cancelled.store(true, Ordering::SeqCst);
            entry.cancel.cancel();
        }
        let deadline = tokio::time::Instant::now() + timeout;
        for entry in entries {
            let mut done = entry.done.clone();
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let _ = tokio::time::timeout(remaining, done.wait_for(|f| *f)).await;
        }
    }

    /// Spawn the reaper that evicts finished sessions past the retention
    /// window.
    pub fn spawn_reaper(&self, interval: Duration) -> JoinHandle<()> {
        let manager = self.clone();
        let cancel = manager.inner.cancel.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => manager.reap(),
                }
            }
        })
    }

    fn reap(&self) {
        let retention_ms = self.inner.config.retention.as_millis() as u64;
        let now = self.inner.clock.epoch_ms();
        let expired: Vec<SessionId> = self
            .inner
            .sessions
            .read()
            .values()
            .filter(|entry| {
                let detail = entry.detail.lock();
                detail.state.is_finished()
                    && detail
                        .ended_at_ms
                        .is_some_and(|ended| now.saturating_sub(ended) > retention_ms)
            })
            .map(|entry| entry.id.clone())
            .collect();
        if expired.is_empty() {
            return;
        }
        let mut sessions = self.inner.sessions.write();
        for id in expired {
            debug!(session = %id, "reaping expired session");
            sessions.remove(&id);
        }
    }

    fn log_important(&self, message: String) {
        if let Some(logs) = &self.inner.logs {
            logs.submit(
                LogRecord::new(
                    self.inner.clock.epoch_ms(),
                    LogLevel::Info,
                    "session_manager",
                    message,
                )
                .important(),
            );
        }
    }
}

/// Forwards a job bus's events into the session dispatcher queue.
struct SessionForwarder {
    tx: mpsc::Sender<SessionCommand>,
}

impl JobEventHandler for SessionForwarder {
    fn handle(&self, event: &JobEvent) -> Result<(), InfraError> {
        let forwarded = match event {
            JobEvent::TestStarting { job_id, test_id, name, .. } => SessionEvent::TestStarting {
                job_id: *job_id,
                test_id: *test_id,
                name: name.clone(),
            },
            JobEvent::TestEnded { job_id, test } => {
                SessionEvent::TestEnded { job_id: *job_id, test: test.clone() }
            }
            JobEvent::JobEnded { job_id, error } => {
                SessionEvent::JobEnded { job_id: *job_id, error: error.clone() }
            }
            _ => return Ok(()),
        };
        self.tx.try_send(SessionCommand::Forward { event: forwarded }).map_err(|_| {
            InfraError::new(ErrorId::Internal, "session dispatcher queue overflow")
        })
    }
}

/// One session's dispatcher: the only place its plugins ever run.
async fn session_task<C: Clock + 'static>(
    inner: Arc<Inner<C>>,
    entry: Arc<SessionEntry>,
    plugins: Vec<(String, Box<dyn SessionPlugin>)>,
    mut rx: mpsc::Receiver<SessionCommand>,
    done_tx: watch::Sender<bool>,
) {
    // Running-session cap: wait for a slot while staying Submitted.
    let _permit = tokio::select! {
        permit = Arc::clone(&inner.running_slots).acquire_owned() => permit.ok(),
        _ = entry.cancel.cancelled() => None,
    };

    let handle = SessionHandle::new(
        entry.id.clone(),
        Arc::clone(&entry.detail),
        Arc::clone(&entry.cancelled),
    );

    // Cancelled before start: skip job creation silently.
    if entry.cancelled.load(Ordering::SeqCst) || _permit.is_none() {
        finish(&inner, &entry, SessionResult::Cancelled, &done_tx);
        return;
    }

    set_state(&entry, SessionState::Starting);
    entry.detail.lock().started_at_ms = Some(inner.clock.epoch_ms());

    // SessionStarting: delivered to every plugin exactly once; errors are
    // recorded and do not stop the remaining plugins.
    handle.open_job_window();
    deliver(&plugins, &handle, &SessionEvent::Starting).await;
    let job_specs = handle.close_job_window();

    if entry.detail.lock().error.is_some() {
        // Failure during SessionStarting: no jobs run.
        deliver(&plugins, &handle, &SessionEvent::Ended { result: SessionResult::Error }).await;
        finish(&inner, &entry, SessionResult::Error, &done_tx);
        return;
    }
    if entry.cancelled.load(Ordering::SeqCst) {
        deliver(&plugins, &handle, &SessionEvent::Ended { result: SessionResult::Cancelled })
            .await;
        finish(&inner, &entry, SessionResult::Cancelled, &done_tx);
        return;
    }

    set_state(&entry, SessionState::Running);
    entry.detail.lock().job_ids = job_specs.iter().map(|s| s.id).collect();

    // One task per job; their bus events come back through our queue.
    let mut runners = JoinSet::new();
    for spec in job_specs {
        let job_id = spec.id;
        let job_cancel = entry.cancel.child_token();
        inner.jobs.write().insert(
            job_id,
            RunningJob { session: entry.id.clone(), cancel: job_cancel.clone() },
        );
        let runner = JobRunner::new(
            spec,
            inner.scheduler.clone(),
            Arc::clone(&inner.devices),
            Arc::clone(&inner.drivers),
            inner.clock.clone(),
            job_cancel,
        );
        runner
            .bus()
            .register("session-forwarder", Arc::new(SessionForwarder { tx: entry.tx.clone() }));
        runners.spawn(runner.run());
    }

    let mut job_error: Option<ErrorRecord> = None;
    while !runners.is_empty() {
        tokio::select! {
            joined = runners.join_next() => match joined {
                Some(Ok(outcome)) => {
                    inner.jobs.write().remove(&outcome.job_id);
                    if job_error.is_none() {
                        job_error = outcome.error;
                    }
                }
                Some(Err(e)) => {
                    error!(session = %entry.id, error = %e, "job task panicked");
                    if job_error.is_none() {
                        job_error = Some(ErrorRecord::new(ErrorId::Internal, "job task failed"));
                    }
                }
                None => break,
            },
            Some(command) = rx.recv() => {
                handle_command(&inner, &plugins, &handle, command).await;
            }
        }
    }
    // Jobs are done; drain forwarded events queued behind the last join.
    while let Ok(command) = rx.try_recv() {
        handle_command(&inner, &plugins, &handle, command).await;
    }

    if let Some(error) = job_error {
        let mut detail = entry.detail.lock();
        if detail.error.is_none() {
            detail.error = Some(error);
        }
    }

    let result = if entry.cancelled.load(Ordering::SeqCst) {
        SessionResult::Cancelled
    } else if entry.detail.lock().error.is_some() {
        SessionResult::Error
    } else {
        SessionResult::Completed
    };

    deliver(&plugins, &handle, &SessionEvent::Ended { result }).await;
    write_outputs(&inner, &entry);
    finish(&inner, &entry, result, &done_tx);
}

async fn handle_command<C: Clock>(
    inner: &Arc<Inner<C>>,
    plugins: &[(String, Box<dyn SessionPlugin>)],
    handle: &SessionHandle,
    command: SessionCommand,
) {
    match command {
        SessionCommand::Notify { payload } => {
            deliver(plugins, handle, &SessionEvent::Notification { payload }).await;
        }
        SessionCommand::Forward { event } => {
            if let (SessionEvent::TestEnded { test, .. }, Some(tx)) =
                (&event, &inner.test_done_tx)
            {
                let _ = tx.try_send(test.id);
            }
            deliver(plugins, handle, &event).await;
        }
    }
}

/// Deliver one event to every plugin, recording (not propagating) errors.
async fn deliver(
    plugins: &[(String, Box<dyn SessionPlugin>)],
    handle: &SessionHandle,
    event: &SessionEvent,
) {
    for (label, plugin) in plugins {
        if let Err(e) = plugin.on_event(handle, event).await {
            warn!(
                session = %handle.id(),
                plugin = %label,
                event = event.name(),
                error = %e,
                "plugin failed"
            );
            handle.record_error(ErrorRecord::from(&e));
        }
    }
}

fn set_state(entry: &SessionEntry, next: SessionState) {
    let mut detail = entry.detail.lock();
    if detail.state.can_advance_to(&next) {
        detail.state = next;
    } else {
        error!(session = %entry.id, from = %detail.state, to = %next, "illegal session transition");
    }
}

fn finish<C: Clock>(
    inner: &Arc<Inner<C>>,
    entry: &SessionEntry,
    result: SessionResult,
    done_tx: &watch::Sender<bool>,
) {
    {
        let mut detail = entry.detail.lock();
        let next = SessionState::Finished { result };
        if detail.state.can_advance_to(&next) {
            detail.state = next;
        }
        detail.ended_at_ms = Some(inner.clock.epoch_ms());
    }
    if let Some(logs) = &inner.logs {
        logs.submit(
            LogRecord::new(
                inner.clock.epoch_ms(),
                LogLevel::Info,
                "session_manager",
                format!("session {} finished: {result}", entry.id),
            )
            .important(),
        );
    }
    info!(session = %entry.id, %result, "session finished");
    let _ = done_tx.send(true);
}

/// Write per-plugin output blobs: one file per output type tag.
fn write_outputs<C: Clock>(inner: &Arc<Inner<C>>, entry: &SessionEntry) {
    let detail = entry.detail.lock();
    if detail.outputs.is_empty() {
        return;
    }
    let dir = inner.config.output_dir.join(entry.id.as_str());
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!(session = %entry.id, error = %e, "cannot create session output dir");
        return;
    }
    for (tag, payload) in &detail.outputs {
        let path = dir.join(tag);
        match serde_json::to_vec_pretty(payload) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&path, bytes) {
                    warn!(session = %entry.id, output = %tag, error = %e, "output write failed");
                }
            }
            Err(e) => warn!(session = %entry.id, output = %tag, error = %e, "output encode failed"),
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
