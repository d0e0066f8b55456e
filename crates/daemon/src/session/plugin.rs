// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session plugins: compiled-in registry and the handle they act through.
//!
//! Plugins are session-scoped subscribers to lifecycle events. They are
//! resolved by label from a static registry when the session is created;
//! there is no runtime discovery.

use async_trait::async_trait;
use olc_core::{
    ErrorId, ErrorRecord, InfraError, JobSpec, SessionDetail, SessionEvent, SessionId,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A session-scoped plugin.
///
/// Events arrive strictly ordered on the session's dispatcher; a plugin
/// never races itself but may run concurrently with plugins of other
/// sessions. Returned errors are recorded on the session and do not stop
/// other plugins.
#[async_trait]
pub trait SessionPlugin: Send + Sync + std::fmt::Debug {
    async fn on_event(
        &self,
        session: &SessionHandle,
        event: &SessionEvent,
    ) -> Result<(), InfraError>;
}

/// Builds a plugin instance from its opaque config blob.
pub type PluginFactory =
    Arc<dyn Fn(&serde_json::Value) -> Result<Box<dyn SessionPlugin>, InfraError> + Send + Sync>;

/// Label → factory table.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    factories: HashMap<String, PluginFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in plugins.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("job-creator", |config| {
            let jobs: Vec<JobSpec> = serde::Deserialize::deserialize(config).map_err(|e| {
                InfraError::new(ErrorId::InvalidArgument, format!("bad job-creator config: {e}"))
            })?;
            Ok(Box::new(JobCreatorPlugin { jobs }) as Box<dyn SessionPlugin>)
        });
        registry
    }

    pub fn register(
        &mut self,
        label: impl Into<String>,
        factory: impl Fn(&serde_json::Value) -> Result<Box<dyn SessionPlugin>, InfraError>
            + Send
            + Sync
            + 'static,
    ) {
        self.factories.insert(label.into(), Arc::new(factory));
    }

    /// Instantiate a plugin by label.
    pub fn build(
        &self,
        label: &str,
        config: &serde_json::Value,
    ) -> Result<Box<dyn SessionPlugin>, InfraError> {
        let factory = self.factories.get(label).ok_or_else(|| {
            InfraError::new(ErrorId::InvalidArgument, format!("unknown plugin {label:?}"))
        })?;
        factory(config)
    }

    pub fn has(&self, label: &str) -> bool {
        self.factories.contains_key(label)
    }
}

/// What a plugin may do to its session.
///
/// Outputs are only mutable through [`Self::set_output`]'s transform,
/// executed under the session lock; plugins never get direct `&mut`
/// access to the map.
pub struct SessionHandle {
    id: SessionId,
    detail: Arc<Mutex<SessionDetail>>,
    pending_jobs: Mutex<Vec<JobSpec>>,
    accepting_jobs: AtomicBool,
    cancelled: Arc<AtomicBool>,
}

impl SessionHandle {
    pub(crate) fn new(
        id: SessionId,
        detail: Arc<Mutex<SessionDetail>>,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            detail,
            pending_jobs: Mutex::new(Vec::new()),
            accepting_jobs: AtomicBool::new(false),
            cancelled,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Register a job on the session. Only legal while `SessionStarting`
    /// is being delivered; specs are validated here, once.
    ///
    /// On a cancelled session the job is silently not created.
    pub fn add_job(&self, spec: JobSpec) -> Result<(), InfraError> {
        if !self.accepting_jobs.load(Ordering::SeqCst) {
            return Err(InfraError::new(
                ErrorId::PreconditionFailed,
                "jobs can only be added during session start",
            ));
        }
        if self.is_cancelled() {
            return Ok(());
        }
        spec.validate()?;
        self.pending_jobs.lock().push(spec);
        Ok(())
    }

    /// Apply a transform to one output payload under the session lock.
    pub fn set_output(
        &self,
        tag: &str,
        transform: impl FnOnce(Option<&serde_json::Value>) -> serde_json::Value,
    ) {
        let mut detail = self.detail.lock();
        let new = transform(detail.outputs.get(tag));
        detail.outputs.insert(tag.to_string(), new);
    }

    /// Current payload of one output.
    pub fn output(&self, tag: &str) -> Option<serde_json::Value> {
        self.detail.lock().outputs.get(tag).cloned()
    }

    /// Record a plugin error on the session without failing the caller.
    pub fn record_error(&self, error: ErrorRecord) {
        let mut detail = self.detail.lock();
        if detail.error.is_none() {
            detail.error = Some(error);
        }
    }

    pub(crate) fn open_job_window(&self) {
        self.accepting_jobs.store(true, Ordering::SeqCst);
    }

    pub(crate) fn close_job_window(&self) -> Vec<JobSpec> {
        self.accepting_jobs.store(false, Ordering::SeqCst);
        std::mem::take(&mut *self.pending_jobs.lock())
    }
}

/// Built-in plugin: registers the jobs listed in its config at
/// `SessionStarting`.
#[derive(Debug)]
struct JobCreatorPlugin {
    jobs: Vec<JobSpec>,
}

#[async_trait]
impl SessionPlugin for JobCreatorPlugin {
    async fn on_event(
        &self,
        session: &SessionHandle,
        event: &SessionEvent,
    ) -> Result<(), InfraError> {
        if matches!(event, SessionEvent::Starting) {
            for spec in &self.jobs {
                session.add_job(spec.clone())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "plugin_tests.rs"]
mod tests;
