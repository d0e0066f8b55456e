// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control and version service handlers.

use super::ListenCtx;
use olc_core::{Clock, ErrorId, InfraError, LogImportance};
use olc_wire::{write_response, ProtocolError, Response};
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tracing::debug;

pub(super) fn set_log_level<C: Clock + 'static>(
    ctx: &Arc<ListenCtx<C>>,
    level: &str,
) -> Response {
    let Some(apply) = &ctx.set_log_level else {
        return Response::error(&InfraError::new(
            ErrorId::PreconditionFailed,
            "runtime log level changes are not wired up",
        ));
    };
    match apply(level) {
        Ok(()) => Response::Ok,
        Err(e) => Response::error(&InfraError::new(
            ErrorId::InvalidArgument,
            format!("bad log level {level:?}: {e}"),
        )),
    }
}

pub(super) fn get_version() -> Response {
    Response::Version {
        version: crate::env::SERVICE_VERSION.to_string(),
        min_client_version: olc_wire::version::MIN_CLIENT_VERSION.to_string(),
    }
}

/// Push log batches to the client until it closes the connection (writes
/// start failing) or the daemon shuts down.
pub(super) async fn stream_logs<W, C>(
    writer: &mut W,
    ctx: &Arc<ListenCtx<C>>,
    min_importance: Option<String>,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    C: Clock + 'static,
{
    let min = match min_importance.as_deref() {
        Some("debug") => LogImportance::Debug,
        Some("important") => LogImportance::Important,
        _ => LogImportance::Normal,
    };
    let mut rx = ctx.logs.subscribe(min);
    debug!("log stream opened");

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => return Ok(()),
            batch = rx.recv() => match batch {
                Some(records) => {
                    if write_response(writer, &Response::LogBatch { records }).await.is_err() {
                        // Client went away; that is how streams close.
                        debug!("log stream closed by peer");
                        return Ok(());
                    }
                }
                // Dropped by the dispatcher (lagged) or manager shutdown.
                None => return Ok(()),
            },
        }
    }
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
