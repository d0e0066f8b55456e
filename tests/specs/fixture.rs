// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness: a full in-process daemon core over fake devices.

use olc_core::{DeviceInfo, FakeClock, JobSpec, PluginSpec, SessionConfig, SessionDetail};
use olc_daemon::session::{
    PluginRegistry, SessionManager, SessionManagerConfig, SessionManagerDeps,
};
use olc_device::{
    DeviceManager, Dispatcher, FakeDispatcher, SchedulerHandle, StandardStateChecker,
    StaticDetector,
};
use olc_engine::DriverRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct Harness {
    pub detector: Arc<StaticDetector>,
    pub devices: Arc<DeviceManager<FakeClock>>,
    pub scheduler: SchedulerHandle,
    pub sessions: SessionManager<FakeClock>,
    pub clock: FakeClock,
    pub cancel: CancellationToken,
    _output_dir: tempfile::TempDir,
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Harness {
    /// Build the core with a custom dispatcher and driver registry; devices
    /// appear on the next detection pass.
    pub async fn with(dispatcher: FakeDispatcher, registry: DriverRegistry) -> Self {
        let detector = Arc::new(StaticDetector::new());
        let clock = FakeClock::new();
        let devices = Arc::new(DeviceManager::new(
            vec![Arc::clone(&detector) as Arc<dyn olc_device::Detector>],
            vec![Arc::new(dispatcher) as Arc<dyn Dispatcher>],
            Arc::new(StandardStateChecker),
            clock.clone(),
        ));
        let cancel = CancellationToken::new();
        let (scheduler, _task) =
            olc_device::spawn_scheduler(Arc::clone(&devices), clock.clone(), cancel.clone());
        let output_dir = tempfile::tempdir().expect("tempdir");
        let sessions = SessionManager::new(SessionManagerDeps {
            plugins: PluginRegistry::builtin(),
            drivers: Arc::new(registry),
            scheduler: scheduler.clone(),
            devices: Arc::clone(&devices),
            clock: clock.clone(),
            config: SessionManagerConfig {
                retention: Duration::from_secs(600),
                max_running: 30,
                output_dir: output_dir.path().to_path_buf(),
            },
            logs: None,
            test_done_tx: None,
            cancel: cancel.clone(),
        });
        Self {
            detector,
            devices,
            scheduler,
            sessions,
            clock,
            cancel,
            _output_dir: output_dir,
        }
    }

    pub async fn with_devices(dispatcher: FakeDispatcher, serials: &[&str]) -> Self {
        let harness = Self::with(dispatcher, DriverRegistry::builtin()).await;
        for serial in serials {
            harness.detector.add(*serial);
        }
        harness.devices.detect_once().await;
        harness
    }

    /// Register a fake device and let the manager pick it up.
    pub async fn add_device(&self, serial: &str) {
        self.detector.add(serial);
        self.devices.detect_once().await;
    }

    pub fn device(&self, serial: &str) -> Option<DeviceInfo> {
        self.devices
            .runner(&olc_core::DeviceId::new(serial))
            .map(|r| r.snapshot())
    }

    /// Run a session wrapping the given jobs and wait for it to finish.
    pub async fn run_jobs(&self, jobs: Vec<JobSpec>) -> SessionDetail {
        let id = self
            .sessions
            .create_session(job_session_config(jobs))
            .expect("create session");
        self.sessions
            .wait(id.as_str(), Some(Duration::from_secs(30)))
            .await
            .expect("session vanished")
    }
}

/// A session config whose only plugin registers the given jobs.
pub fn job_session_config(jobs: Vec<JobSpec>) -> SessionConfig {
    SessionConfig {
        name: "spec".to_string(),
        plugins: vec![PluginSpec::with_config(
            "job-creator",
            serde_json::to_value(jobs).expect("encode jobs"),
        )],
        metadata: Default::default(),
    }
}

/// A pixel-flavored dispatcher: every serial becomes an idle pixel device.
pub fn pixel_dispatcher() -> FakeDispatcher {
    FakeDispatcher::new("android_real").with_configure(|device| {
        device.properties.product_type = Some("pixel".to_string());
        device.properties.sdk_version = Some(34);
        device.properties.battery_level = Some(80);
    })
}
