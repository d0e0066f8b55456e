// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job event bus.
//!
//! Two delivery paths: registered handlers run synchronously in
//! registration order (internal handlers register before API plugins, so
//! they see events first), and a broadcast stream serves cross-task
//! consumers with drop-oldest semantics. A failing handler is logged and
//! never affects the others.

use olc_core::JobEvent;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Broadcast capacity per job bus; a lagging stream consumer loses the
/// oldest events rather than blocking publishers.
const STREAM_CAPACITY: usize = 128;

/// Callback subscriber on a job's event bus.
pub trait JobEventHandler: Send + Sync {
    fn handle(&self, event: &JobEvent) -> Result<(), olc_core::InfraError>;
}

/// Fan-out for one job's lifecycle events.
pub struct JobEventBus {
    handlers: RwLock<Vec<(String, Arc<dyn JobEventHandler>)>>,
    stream: broadcast::Sender<JobEvent>,
}

impl Default for JobEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl JobEventBus {
    pub fn new() -> Self {
        let (stream, _) = broadcast::channel(STREAM_CAPACITY);
        Self { handlers: RwLock::new(Vec::new()), stream }
    }

    /// Register a handler. Delivery order is registration order.
    pub fn register(&self, name: impl Into<String>, handler: Arc<dyn JobEventHandler>) {
        self.handlers.write().push((name.into(), handler));
    }

    /// Subscribe to the event stream (drop-oldest on lag).
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.stream.subscribe()
    }

    /// Deliver an event to every handler, then the stream.
    ///
    /// Handler errors are logged and swallowed; one bad subscriber must not
    /// starve the rest or fail the publisher.
    pub fn publish(&self, event: JobEvent) {
        for (name, handler) in self.handlers.read().iter() {
            if let Err(e) = handler.handle(&event) {
                warn!(subscriber = %name, event = event.name(), error = %e, "job event subscriber failed");
            }
        }
        let _ = self.stream.send(event);
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
