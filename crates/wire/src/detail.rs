// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session detail DTO with field-mask trimming.
//!
//! Clients can request partial details to avoid streaming large output
//! payloads. Mask paths name top-level fields (`state`, `outputs`, ...);
//! `outputs.<tag>` selects a single output entry.

use olc_core::{ErrorRecord, JobId, SessionDetail, SessionId, SessionState};
use serde::{Deserialize, Serialize};

/// Output maps cross the wire as ordered pairs so clients keep insertion
/// order without an ordered-map dependency.
pub type OutputMap = Vec<(String, serde_json::Value)>;

/// Wire form of a session's detail; unset fields were masked out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetailDto {
    pub id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<SessionState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<OutputMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_ids: Option<Vec<JobId>>,
}

/// Field-mask path segments understood by [`SessionDetailDto::from_detail`].
const KNOWN_FIELDS: &[&str] =
    &["id", "name", "state", "created_at_ms", "started_at_ms", "ended_at_ms", "outputs", "error", "job_ids"];

impl SessionDetailDto {
    /// Build a DTO from a detail, keeping only masked fields.
    ///
    /// No mask (or an empty one) keeps everything. Unknown paths are
    /// ignored — a newer client may name fields this server predates.
    pub fn from_detail(detail: &SessionDetail, mask: Option<&[String]>) -> Self {
        let keep = |field: &str| -> bool {
            match mask {
                None => true,
                Some(paths) if paths.is_empty() => true,
                Some(paths) => paths.iter().any(|p| p == field || p.starts_with(&format!("{field}."))),
            }
        };

        let outputs = if keep("outputs") {
            let selected: Vec<(String, serde_json::Value)> = detail
                .outputs
                .iter()
                .filter(|(tag, _)| match mask {
                    None => true,
                    Some(paths) if paths.is_empty() => true,
                    Some(paths) => paths.iter().any(|p| {
                        p == "outputs" || p.as_str() == format!("outputs.{tag}").as_str()
                    }),
                })
                .map(|(tag, payload)| (tag.clone(), payload.clone()))
                .collect();
            Some(selected)
        } else {
            None
        };

        Self {
            id: detail.id.clone(),
            name: keep("name").then(|| detail.name.clone()),
            state: keep("state").then_some(detail.state),
            created_at_ms: keep("created_at_ms").then_some(detail.created_at_ms),
            started_at_ms: keep("started_at_ms").then_some(detail.started_at_ms).flatten(),
            ended_at_ms: keep("ended_at_ms").then_some(detail.ended_at_ms).flatten(),
            outputs,
            error: keep("error").then(|| detail.error.clone()).flatten(),
            job_ids: keep("job_ids").then(|| detail.job_ids.clone()),
        }
    }

    /// Whether a mask path could ever match a field this DTO carries.
    pub fn is_known_path(path: &str) -> bool {
        let head = path.split('.').next().unwrap_or(path);
        KNOWN_FIELDS.contains(&head)
    }
}

#[cfg(test)]
#[path = "detail_tests.rs"]
mod tests;
