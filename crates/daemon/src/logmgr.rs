// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log manager: bounded record buffer plus fan-out to stream subscribers.
//!
//! Producers never block: `submit` pushes into a drop-oldest queue and
//! wakes the dispatcher task, which batches records out to each
//! subscriber's own channel. A subscriber whose channel stays full past
//! the lag threshold is dropped with a lag marker.

use olc_core::{LogImportance, LogLevel, LogRecord};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Batches a subscriber channel holds before the sender counts it as
/// lagging.
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 64;

struct Subscriber {
    id: u64,
    min_importance: LogImportance,
    tx: mpsc::Sender<Vec<LogRecord>>,
    /// Consecutive full-channel sends.
    lag: u32,
}

struct Shared {
    queue: Mutex<VecDeque<LogRecord>>,
    capacity: usize,
    evicted: AtomicU64,
    notify: Notify,
    subscribers: Mutex<Vec<Subscriber>>,
    next_subscriber_id: AtomicU64,
    lag_threshold: u32,
}

/// Cloneable handle to the log manager.
#[derive(Clone)]
pub struct LogManager {
    shared: Arc<Shared>,
}

impl LogManager {
    /// Create the manager and spawn its dispatcher task.
    pub fn spawn(
        capacity: usize,
        lag_threshold: u32,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(1_024))),
            capacity,
            evicted: AtomicU64::new(0),
            notify: Notify::new(),
            subscribers: Mutex::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(1),
            lag_threshold,
        });
        let manager = Self { shared: Arc::clone(&shared) };
        let task = tokio::spawn(dispatch_loop(shared, cancel));
        (manager, task)
    }

    /// Submit a record. Never blocks; on a full buffer the oldest record
    /// is evicted and counted.
    pub fn submit(&self, record: LogRecord) {
        {
            let mut queue = self.shared.queue.lock();
            if queue.len() >= self.shared.capacity {
                queue.pop_front();
                self.shared.evicted.fetch_add(1, Ordering::Relaxed);
            }
            queue.push_back(record);
        }
        self.shared.notify.notify_one();
    }

    /// Records evicted due to buffer overflow since startup.
    pub fn evicted(&self) -> u64 {
        self.shared.evicted.load(Ordering::Relaxed)
    }

    /// Subscribe to the record stream from this point on.
    pub fn subscribe(&self, min_importance: LogImportance) -> mpsc::Receiver<Vec<LogRecord>> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        let id = self.shared.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.shared.subscribers.lock().push(Subscriber { id, min_importance, tx, lag: 0 });
        debug!(subscriber = id, "log subscriber added");
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().len()
    }
}

async fn dispatch_loop(shared: Arc<Shared>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = shared.notify.notified() => {}
        }

        let batch: Vec<LogRecord> = {
            let mut queue = shared.queue.lock();
            queue.drain(..).collect()
        };
        if batch.is_empty() {
            continue;
        }

        let lag_threshold = shared.lag_threshold;
        let mut subscribers = shared.subscribers.lock();
        subscribers.retain_mut(|subscriber| {
            // Closed receiver: the client went away.
            if subscriber.tx.is_closed() {
                return false;
            }
            let filtered: Vec<LogRecord> = batch
                .iter()
                .filter(|r| r.importance >= subscriber.min_importance)
                .cloned()
                .collect();
            if filtered.is_empty() {
                return true;
            }
            match subscriber.tx.try_send(filtered) {
                Ok(()) => {
                    subscriber.lag = 0;
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    subscriber.lag += 1;
                    if subscriber.lag > lag_threshold {
                        info!(subscriber = subscriber.id, "dropping lagged log subscriber");
                        // Best effort: leave a marker if a slot frees up.
                        let marker = LogRecord::new(
                            batch.last().map(|r| r.timestamp_ms).unwrap_or_default(),
                            LogLevel::Warn,
                            "log_manager",
                            "subscriber lagged; stream truncated",
                        )
                        .important();
                        let _ = subscriber.tx.try_send(vec![marker]);
                        false
                    } else {
                        true
                    }
                }
            }
        });
    }
    debug!("log dispatcher stopped");
}

#[cfg(test)]
#[path = "logmgr_tests.rs"]
mod tests;
