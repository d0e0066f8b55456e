// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session service handlers.

use super::ListenCtx;
use olc_core::{Clock, SessionConfig, SessionDetail, SessionState};
use olc_wire::{Response, SessionDetailDto, SessionFilter};
use std::sync::Arc;
use std::time::Duration;

pub(super) fn create_session<C: Clock + 'static>(
    ctx: &Arc<ListenCtx<C>>,
    config: SessionConfig,
) -> Response {
    match ctx.sessions.create_session(config) {
        Ok(id) => Response::SessionId { id },
        Err(e) => Response::error(&e),
    }
}

/// Create a session and block until it finishes or the client deadline
/// elapses; either way the latest detail is returned.
pub(super) async fn run_session<C: Clock + 'static>(
    ctx: &Arc<ListenCtx<C>>,
    config: SessionConfig,
    deadline_ms: Option<u64>,
) -> Response {
    let id = match ctx.sessions.create_session(config) {
        Ok(id) => id,
        Err(e) => return Response::error(&e),
    };
    let deadline = deadline_ms.map(Duration::from_millis);
    match ctx.sessions.wait(id.as_str(), deadline).await {
        Some(detail) => Response::SessionDetail {
            detail: SessionDetailDto::from_detail(&detail, None),
        },
        None => Response::error(&olc_core::InfraError::new(
            olc_core::ErrorId::Internal,
            "session vanished while running",
        )),
    }
}

pub(super) fn get_session<C: Clock + 'static>(
    ctx: &Arc<ListenCtx<C>>,
    id: &str,
    field_mask: Option<Vec<String>>,
) -> Response {
    match ctx.sessions.detail(id) {
        Some(detail) => Response::SessionDetail {
            detail: SessionDetailDto::from_detail(&detail, field_mask.as_deref()),
        },
        None => Response::error(&olc_core::InfraError::new(
            olc_core::ErrorId::NotFound,
            format!("no session {id}"),
        )),
    }
}

pub(super) fn get_all_sessions<C: Clock + 'static>(
    ctx: &Arc<ListenCtx<C>>,
    field_mask: Option<Vec<String>>,
    filter: Option<SessionFilter>,
) -> Response {
    let sessions = ctx
        .sessions
        .all_details()
        .into_iter()
        .filter(|detail| filter.as_ref().is_none_or(|f| matches_filter(detail, f)))
        .map(|detail| SessionDetailDto::from_detail(&detail, field_mask.as_deref()))
        .collect();
    Response::SessionList { sessions }
}

pub(super) fn notify_session<C: Clock + 'static>(
    ctx: &Arc<ListenCtx<C>>,
    id: &str,
    payload: &str,
) -> Response {
    match ctx.sessions.notify(id, payload) {
        Ok(()) => Response::Ok,
        Err(e) => Response::error(&e),
    }
}

fn matches_filter(detail: &SessionDetail, filter: &SessionFilter) -> bool {
    if let Some(needle) = &filter.name_contains {
        if !detail.name.contains(needle.as_str()) {
            return false;
        }
    }
    if filter.running_only && detail.state.is_finished() {
        return false;
    }
    if let Some(wanted) = filter.result {
        let SessionState::Finished { result } = detail.state else {
            return false;
        };
        if result != wanted {
            return false;
        }
    }
    true
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
