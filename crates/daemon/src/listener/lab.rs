// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lab info handlers: device population queries.

use super::ListenCtx;
use olc_core::{Clock, DeviceSelectionOptions};
use olc_wire::Response;
use std::sync::Arc;

pub(super) fn get_device_infos<C: Clock + 'static>(
    ctx: &Arc<ListenCtx<C>>,
    filter: Option<DeviceSelectionOptions>,
) -> Response {
    if let Some(filter) = &filter {
        if let Err(e) = filter.validate() {
            return Response::error(&e);
        }
    }
    Response::DeviceList { devices: ctx.devices.query(filter.as_ref()) }
}

#[cfg(test)]
#[path = "lab_tests.rs"]
mod tests;
