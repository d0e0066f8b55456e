// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! The Listener runs in a spawned task, accepting connections and handling
//! them without blocking the session manager. Each connection starts with
//! a `Hello` version/auth handshake, then serves framed request/response
//! pairs; `GetLog` switches the connection into server-streaming mode.

mod control;
mod lab;
mod session;

use crate::logmgr::LogManager;
use crate::session::SessionManager;
use olc_core::{Clock, ErrorId, InfraError};
use olc_device::DeviceManager;
use olc_wire::{read_request, write_response, ProtocolError, Request, Response};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Applies a runtime log-level change; wired up by the composition root.
pub type SetLogLevelFn = Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

/// Shared daemon context for all request handlers.
pub struct ListenCtx<C: Clock> {
    pub sessions: SessionManager<C>,
    pub devices: std::sync::Arc<DeviceManager<C>>,
    pub logs: LogManager,
    /// Auth token for TCP connections (from `OLC_AUTH_TOKEN`).
    /// When set, TCP clients must provide this token in the Hello handshake.
    pub auth_token: Option<String>,
    pub set_log_level: Option<SetLogLevelFn>,
    pub shutdown: Arc<Notify>,
    pub cancel: CancellationToken,
}

/// Where a connection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionSource {
    Unix,
    Tcp,
}

/// Listener task for accepting socket connections.
pub struct Listener<C: Clock> {
    unix: UnixListener,
    tcp: Option<TcpListener>,
    ctx: Arc<ListenCtx<C>>,
}

impl<C: Clock + 'static> Listener<C> {
    /// Create a new listener with Unix socket only.
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx<C>>) -> Self {
        Self { unix, tcp: None, ctx }
    }

    /// Create a new listener with both Unix socket and TCP.
    pub fn with_tcp(unix: UnixListener, tcp: TcpListener, ctx: Arc<ListenCtx<C>>) -> Self {
        Self { unix, tcp: Some(tcp), ctx }
    }

    /// Run the listener loop until shutdown, spawning tasks per connection.
    pub async fn run(mut self) {
        match self.tcp.take() {
            Some(tcp) => self.run_dual(tcp).await,
            None => self.run_unix_only().await,
        }
    }

    async fn run_unix_only(self) {
        loop {
            tokio::select! {
                _ = self.ctx.cancel.cancelled() => break,
                result = self.unix.accept() => match result {
                    Ok((stream, _)) => {
                        let ctx = Arc::clone(&self.ctx);
                        tokio::spawn(async move {
                            let (reader, writer) = stream.into_split();
                            if let Err(e) =
                                handle_connection(reader, writer, ConnectionSource::Unix, &ctx).await
                            {
                                log_connection_error(e);
                            }
                        });
                    }
                    Err(e) => error!("Unix accept error: {}", e),
                }
            }
        }
    }

    async fn run_dual(self, tcp: TcpListener) {
        loop {
            tokio::select! {
                _ = self.ctx.cancel.cancelled() => break,
                result = self.unix.accept() => match result {
                    Ok((stream, _)) => {
                        let ctx = Arc::clone(&self.ctx);
                        tokio::spawn(async move {
                            let (reader, writer) = stream.into_split();
                            if let Err(e) =
                                handle_connection(reader, writer, ConnectionSource::Unix, &ctx).await
                            {
                                log_connection_error(e);
                            }
                        });
                    }
                    Err(e) => error!("Unix accept error: {}", e),
                },
                result = tcp.accept() => match result {
                    Ok((stream, addr)) => {
                        debug!("TCP connection from {}", addr);
                        let ctx = Arc::clone(&self.ctx);
                        tokio::spawn(async move {
                            let (reader, writer) = stream.into_split();
                            if let Err(e) =
                                handle_connection(reader, writer, ConnectionSource::Tcp, &ctx).await
                            {
                                log_connection_error(e);
                            }
                        });
                    }
                    Err(e) => error!("TCP accept error: {}", e),
                },
            }
        }
    }
}

fn log_connection_error(e: ProtocolError) {
    match &e {
        // Normal client disconnects are noise, not errors.
        ProtocolError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
            debug!("connection closed by peer");
        }
        _ => warn!("connection error: {}", e),
    }
}

/// Serve one connection: handshake, then request/response until EOF.
pub(crate) async fn handle_connection<R, W, C>(
    mut reader: R,
    mut writer: W,
    source: ConnectionSource,
    ctx: &Arc<ListenCtx<C>>,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    C: Clock + 'static,
{
    // Handshake: the first frame must be Hello.
    let first = read_request(&mut reader).await?;
    match first {
        Request::Hello { version, min_service_version, token } => {
            if source == ConnectionSource::Tcp {
                let expected = ctx.auth_token.as_deref();
                if expected.is_some() && token.as_deref() != expected {
                    let err = InfraError::new(ErrorId::InvalidArgument, "invalid auth token");
                    write_response(&mut writer, &Response::error(&err)).await?;
                    return Ok(());
                }
            }
            if let Some(min) = &min_service_version {
                if !olc_wire::version::is_compatible(min, crate::env::SERVICE_VERSION) {
                    let err = InfraError::new(
                        ErrorId::VersionIncompatible,
                        format!(
                            "client requires service >= {min}, this is {}",
                            crate::env::SERVICE_VERSION
                        ),
                    );
                    write_response(&mut writer, &Response::error(&err)).await?;
                    return Ok(());
                }
            }
            debug!(client = %version, ?source, "handshake accepted");
            write_response(
                &mut writer,
                &Response::Hello { version: crate::env::SERVICE_VERSION.to_string() },
            )
            .await?;
        }
        other => {
            debug!(request = ?other, "request before handshake");
            let err =
                InfraError::new(ErrorId::PreconditionFailed, "Hello handshake required first");
            write_response(&mut writer, &Response::error(&err)).await?;
            return Ok(());
        }
    }

    loop {
        let request = match read_request(&mut reader).await {
            Ok(request) => request,
            Err(ProtocolError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        debug!(request = ?request, "request received");

        match request {
            Request::GetLog { min_importance } => {
                // Switches this connection into streaming mode; never
                // returns to request/response.
                return control::stream_logs(&mut writer, ctx, min_importance).await;
            }
            Request::KillServer => {
                write_response(&mut writer, &Response::Ok).await?;
                ctx.shutdown.notify_one();
                return Ok(());
            }
            other => {
                let response = dispatch(other, ctx).await;
                debug!(response = ?response, "response sent");
                write_response(&mut writer, &response).await?;
            }
        }
    }
}

async fn dispatch<C: Clock + 'static>(request: Request, ctx: &Arc<ListenCtx<C>>) -> Response {
    match request {
        Request::CreateSession { config } => session::create_session(ctx, config),
        Request::RunSession { config, deadline_ms } => {
            session::run_session(ctx, config, deadline_ms).await
        }
        Request::GetSession { id, field_mask } => session::get_session(ctx, &id, field_mask),
        Request::GetAllSessions { field_mask, filter } => {
            session::get_all_sessions(ctx, field_mask, filter)
        }
        Request::NotifySession { id, payload } => session::notify_session(ctx, &id, &payload),
        Request::Heartbeat => Response::Ok,
        Request::SetLogLevel { level } => control::set_log_level(ctx, &level),
        Request::GetVersion => control::get_version(),
        Request::GetDeviceInfos { filter } => lab::get_device_infos(ctx, filter),
        // Repeated Hello is tolerated.
        Request::Hello { .. } => {
            Response::Hello { version: crate::env::SERVICE_VERSION.to_string() }
        }
        // Handled by the connection loop.
        Request::GetLog { .. } | Request::KillServer => Response::Ok,
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
