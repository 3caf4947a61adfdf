//! Secure session lifecycle.
//!
//! # State Machine
//! ```text
//! Unestablished → Handshaking → Established → Closed
//!                      │                         ▲
//!                      └──── handshake failed ───┘
//! ```
//! `Closed` is terminal. A session handed out by [`begin_session`] is always
//! `Established`; [`SecureSession::end`] moves it to `Closed`.

use std::io;
use std::time::Duration;

use rustls::pki_types::CertificateDer;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;

use crate::net::tls::SecurityContext;
use crate::resilience::timeouts::with_deadline;

/// Lifecycle state of a secure session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unestablished,
    Handshaking,
    Established,
    Closed,
}

impl SessionState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Unestablished, Handshaking)
                | (Handshaking, Established)
                | (Handshaking, Closed)
                | (Established, Closed)
        )
    }
}

/// Handshake failures. Never fatal to the process.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("TLS handshake failed: {0}")]
    HandshakeFailed(#[source] io::Error),

    #[error("TLS handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),
}

/// An established TLS session over an accepted TCP stream.
pub struct SecureSession {
    stream: Option<Box<TlsStream<TcpStream>>>,
    state: SessionState,
}

/// Run the server side of the handshake on `raw`.
///
/// The peer must present a certificate accepted by the context's verifier.
/// On failure the raw stream has already been dropped (and so closed).
pub async fn begin_session(
    raw: TcpStream,
    context: &SecurityContext,
    timeout: Option<Duration>,
) -> Result<SecureSession, SessionError> {
    let mut state = SessionState::Unestablished;
    advance(&mut state, SessionState::Handshaking);

    let handshake = context.acceptor().accept(raw);
    let outcome = match with_deadline(timeout, handshake).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(SessionError::HandshakeFailed(e)),
        // The deadline only fires when a timeout is configured.
        Err(_) => Err(SessionError::HandshakeTimeout(timeout.unwrap_or_default())),
    };

    match outcome {
        Ok(stream) => {
            advance(&mut state, SessionState::Established);
            Ok(SecureSession {
                stream: Some(Box::new(stream)),
                state,
            })
        }
        Err(e) => {
            advance(&mut state, SessionState::Closed);
            Err(e)
        }
    }
}

fn advance(state: &mut SessionState, next: SessionState) {
    debug_assert!(state.can_transition_to(next), "{state:?} -> {next:?}");
    tracing::trace!(from = ?state, to = ?next, "Session state change");
    *state = next;
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "secure session is closed")
}

impl SecureSession {
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Certificates the client presented during the handshake.
    pub fn peer_certificates(&self) -> Option<&[CertificateDer<'static>]> {
        self.stream
            .as_ref()
            .and_then(|stream| stream.get_ref().1.peer_certificates())
    }

    /// Read decrypted bytes into `buf`. Returns 0 when the peer closed cleanly.
    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let stream = self.stream.as_mut().ok_or_else(closed_error)?;
        stream.read(buf).await
    }

    /// Encrypt and send all of `bytes`, then flush.
    pub async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let stream = self.stream.as_mut().ok_or_else(closed_error)?;
        stream.write_all(bytes).await?;
        stream.flush().await
    }

    /// Send close-notify, shut down the TCP write half and release the session.
    ///
    /// Only the first call does anything; later calls report `NotConnected`.
    pub async fn end(&mut self) -> io::Result<()> {
        let mut stream = self.stream.take().ok_or_else(closed_error)?;
        advance(&mut self.state, SessionState::Closed);
        stream.shutdown().await
    }
}

impl std::fmt::Debug for SecureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureSession")
            .field("state", &self.state)
            .finish()
    }
}
