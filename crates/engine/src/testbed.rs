// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-device testbed coordination.
//!
//! Each subdevice runs its own decorator chain with a synchronization
//! driver at the innermost position. The main driver runs exactly once,
//! only after every chain finishes setup; chains hold their teardown until
//! the main driver completes. A fault in any chain before the setup
//! barrier cancels the others and skips the main driver.

use crate::driver::{Decorator, Driver, DriverChain, TestContext};
use async_trait::async_trait;
use olc_core::{ErrorId, InfraError, TestResult};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Countdown latch over a watch channel.
pub struct Latch {
    tx: watch::Sender<usize>,
}

impl Latch {
    pub fn new(count: usize) -> Self {
        let (tx, _) = watch::channel(count);
        Self { tx }
    }

    pub fn count_down(&self) {
        self.tx.send_modify(|v| *v = v.saturating_sub(1));
    }

    /// Wait until the count reaches zero.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // wait_for only errs when the sender is dropped; the latch owns it.
        let _ = rx.wait_for(|v| *v == 0).await;
    }

    pub fn remaining(&self) -> usize {
        *self.tx.borrow()
    }
}

/// Innermost driver of every subdevice chain: signals setup completion,
/// then blocks until the main driver releases teardown.
struct SyncPoint {
    setup: Arc<Latch>,
    teardown: Arc<Latch>,
    abort: CancellationToken,
}

#[async_trait]
impl Driver for SyncPoint {
    fn name(&self) -> &str {
        "sync_point"
    }

    async fn run(&self, _ctx: &TestContext) -> Result<TestResult, InfraError> {
        self.setup.count_down();
        tokio::select! {
            _ = self.teardown.wait() => Ok(TestResult::Pass),
            _ = self.abort.cancelled() => {
                Err(InfraError::new(ErrorId::Cancelled, "testbed aborted before teardown"))
            }
        }
    }
}

/// Run one test across N subdevice chains plus a main driver.
///
/// `ctx` must carry an N-device allocation; each chain gets the same
/// decorator list over its own subdevice view. Returns the main driver's
/// result, or the first recorded chain error.
pub async fn run_testbed(
    decorators: Vec<Arc<dyn Decorator>>,
    driver: Arc<dyn Driver>,
    ctx: &TestContext,
    remaining: Duration,
) -> Result<TestResult, InfraError> {
    let n = ctx.devices.len();
    debug_assert!(n >= 2, "testbed needs at least two devices");

    let setup = Arc::new(Latch::new(n));
    let teardown = Arc::new(Latch::new(1));
    let abort = CancellationToken::new();
    let first_error: Arc<Mutex<Option<InfraError>>> = Arc::new(Mutex::new(None));

    let mut chains = Vec::with_capacity(n);
    for index in 0..n {
        let sub_ctx = ctx.for_subdevice(index);
        let chain = DriverChain::new(
            decorators.clone(),
            Arc::new(SyncPoint {
                setup: Arc::clone(&setup),
                teardown: Arc::clone(&teardown),
                abort: abort.clone(),
            }),
        );
        let abort = abort.clone();
        let first_error = Arc::clone(&first_error);
        chains.push(tokio::spawn(async move {
            if let Err(e) = chain.run(&sub_ctx).await {
                warn!(subdevice = index, error = %e, "testbed chain failed");
                let mut slot = first_error.lock();
                if slot.is_none() {
                    *slot = Some(e);
                }
                // Cancel peers still waiting on a barrier.
                abort.cancel();
            }
        }));
    }

    // Phase 1: all setups complete, or a chain faults first.
    let setup_ok = tokio::select! {
        _ = setup.wait() => true,
        _ = abort.cancelled() => false,
    };

    // Phase 2: run the main driver only on a clean barrier.
    let driver_result = if setup_ok {
        match tokio::time::timeout(remaining, driver.run(ctx)).await {
            Ok(result) => result,
            Err(_) => {
                abort.cancel();
                Err(InfraError::new(ErrorId::Timeout, "testbed driver timed out"))
            }
        }
    } else {
        debug!("setup barrier aborted, skipping main driver");
        Err(InfraError::new(ErrorId::Internal, "testbed setup failed"))
    };

    // Phase 3: release every chain into teardown and join them.
    teardown.count_down();
    for chain in chains {
        let abort_handle = chain.abort_handle();
        match tokio::time::timeout(remaining, chain).await {
            Ok(_) => {}
            Err(_) => {
                warn!("testbed chain did not tear down in time, interrupting");
                abort.cancel();
                abort_handle.abort();
            }
        }
    }

    // First recorded chain error wins over the driver's own outcome.
    if let Some(e) = first_error.lock().take() {
        return Err(e);
    }
    driver_result
}

#[cfg(test)]
#[path = "testbed_tests.rs"]
mod tests;
