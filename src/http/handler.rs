//! Per-connection request handling.
//!
//! # Responsibilities
//! - Optional TLS handshake
//! - One bounded read, request-line parse, response write
//! - Teardown on every path, with failures kept inside the connection
//!
//! # Design Decisions
//! - A single read per request; bytes past the buffer are never read
//! - Writes retry until the whole response is out (no silent truncation)
//! - Handshake, read and write deadlines come from `TimeoutConfig`; the write
//!   deadline also bounds the close at teardown

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::Instrument;

use crate::config::{LimitsConfig, ServerConfig, TimeoutConfig};
use crate::http::request::{RequestLine, TokenBounds};
use crate::http::response::{build_response, ResponseError, ServerMode};
use crate::net::connection::Connection;
use crate::net::session::SessionError;
use crate::net::tls::SecurityContext;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;

/// Why a connection ended without a response. Never escapes the handler.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Handshake(#[from] SessionError),

    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("read timed out after {0:?}")]
    ReadTimeout(Duration),

    #[error("peer closed the connection before sending a request")]
    EmptyRequest,

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),
}

impl ConnectionError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectionError::Handshake(_) => "handshake",
            ConnectionError::Read(_) => "read",
            ConnectionError::ReadTimeout(_) => "read_timeout",
            ConnectionError::EmptyRequest => "empty_request",
            ConnectionError::Response(_) => "response",
            ConnectionError::Write(_) => "write",
            ConnectionError::WriteTimeout(_) => "write_timeout",
        }
    }
}

/// What a served connection produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub request: RequestLine,
    pub response_bytes: usize,
}

/// Immutable per-server state used to handle each connection.
#[derive(Debug)]
pub struct ConnectionHandler {
    limits: LimitsConfig,
    timeouts: TimeoutConfig,
    security: Option<SecurityContext>,
}

impl ConnectionHandler {
    /// `security` decides the mode: `Some` means every connection must complete a handshake.
    pub fn new(config: &ServerConfig, security: Option<SecurityContext>) -> Self {
        Self {
            limits: config.limits.clone(),
            timeouts: config.timeouts.clone(),
            security,
        }
    }

    pub fn mode(&self) -> ServerMode {
        ServerMode::from_tls(self.security.is_some())
    }

    /// Serve `connection` and tear it down, whatever happens.
    pub async fn serve(self: Arc<Self>, mut connection: Connection) {
        let span = tracing::info_span!(
            "connection",
            connection_id = %connection.id(),
            peer_addr = %connection.peer_addr(),
        );

        async move {
            match self.process(&mut connection).await {
                Ok(served) => {
                    metrics::response_sent(served.response_bytes);
                    tracing::info!(
                        method = %served.request.method_lossy(),
                        target = %served.request.target_lossy(),
                        bytes = served.response_bytes,
                        "Response sent"
                    );
                }
                Err(e) => {
                    metrics::connection_error(e.kind());
                    if matches!(e, ConnectionError::EmptyRequest) {
                        tracing::debug!("{e}");
                    } else {
                        tracing::warn!(error = %e, "Connection abandoned");
                    }
                }
            }
            connection.teardown(self.timeouts.write()).await;
        }
        .instrument(span)
        .await
    }

    /// Handshake, read, parse, respond. Does not tear down.
    pub async fn process(&self, connection: &mut Connection) -> Result<Served, ConnectionError> {
        if let Some(context) = &self.security {
            connection.secure(context, self.timeouts.handshake()).await?;
        }

        let mut buf = vec![0u8; self.limits.request_buffer_bytes];
        let readable = self.limits.readable_request_bytes();
        let n = self.read_request(connection, &mut buf[..readable]).await?;
        if n == 0 {
            return Err(ConnectionError::EmptyRequest);
        }

        let request = RequestLine::parse(&buf[..n], TokenBounds::from(&self.limits));
        tracing::debug!(
            bytes = n,
            method = %request.method_lossy(),
            target = %request.target_lossy(),
            "Request received"
        );

        let wire = build_response(&request, self.mode(), self.limits.max_response_bytes)?;
        self.write_response(connection, &wire).await?;

        Ok(Served {
            request,
            response_bytes: wire.len(),
        })
    }

    async fn read_request(
        &self,
        connection: &mut Connection,
        buf: &mut [u8],
    ) -> Result<usize, ConnectionError> {
        let limit = self.timeouts.read();
        match with_deadline(limit, connection.read(buf)).await {
            Ok(read) => read.map_err(ConnectionError::Read),
            Err(_) => Err(ConnectionError::ReadTimeout(limit.unwrap_or_default())),
        }
    }

    async fn write_response(
        &self,
        connection: &mut Connection,
        wire: &[u8],
    ) -> Result<(), ConnectionError> {
        let limit = self.timeouts.write();
        match with_deadline(limit, connection.write_all(wire)).await {
            Ok(written) => written.map_err(ConnectionError::Write),
            Err(_) => Err(ConnectionError::WriteTimeout(limit.unwrap_or_default())),
        }
    }
}
