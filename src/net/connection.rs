//! Connection state and lifecycle tracking.
//!
//! # Responsibilities
//! - Number connections in acceptance order for log correlation
//! - Hold the active channel (raw TCP or secure session) for one client
//! - Tear the connection down exactly once
//! - Count accepted/closed connections and begun/ended sessions

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::net::session::{begin_session, SecureSession, SessionError};
use crate::net::tls::SecurityContext;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;

/// Acceptance sequence number of a connection, as issued by its tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    closed: AtomicU64,
    sessions_begun: AtomicU64,
    sessions_ended: AtomicU64,
    handshake_failures: AtomicU64,
}

/// Point-in-time view of the tracker's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackerSnapshot {
    pub accepted: u64,
    pub closed: u64,
    pub sessions_begun: u64,
    pub sessions_ended: u64,
    pub handshake_failures: u64,
}

impl TrackerSnapshot {
    /// Connections accepted but not yet torn down.
    pub fn active(&self) -> u64 {
        self.accepted.saturating_sub(self.closed)
    }
}

/// Tracks connection and session lifetimes across the whole server.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    counters: Arc<Counters>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new accepted connection. Returns a guard that records the close on drop.
    ///
    /// IDs count up from 1 in acceptance order.
    pub fn track(&self) -> ConnectionGuard {
        let seq = self.counters.accepted.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::connection_accepted();
        ConnectionGuard {
            counters: Arc::clone(&self.counters),
            id: ConnectionId(seq),
        }
    }

    /// Accepted connections not yet torn down.
    pub fn active_count(&self) -> u64 {
        self.snapshot().active()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let c = &self.counters;
        TrackerSnapshot {
            accepted: c.accepted.load(Ordering::SeqCst),
            closed: c.closed.load(Ordering::SeqCst),
            sessions_begun: c.sessions_begun.load(Ordering::SeqCst),
            sessions_ended: c.sessions_ended.load(Ordering::SeqCst),
            handshake_failures: c.handshake_failures.load(Ordering::SeqCst),
        }
    }
}

/// Held by a [`Connection`] for its whole life; dropping it counts the close.
#[derive(Debug)]
pub struct ConnectionGuard {
    counters: Arc<Counters>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    fn session_begun(&self) {
        self.counters.sessions_begun.fetch_add(1, Ordering::SeqCst);
    }

    fn session_ended(&self) {
        self.counters.sessions_ended.fetch_add(1, Ordering::SeqCst);
    }

    fn handshake_failed(&self) {
        self.counters.handshake_failures.fetch_add(1, Ordering::SeqCst);
        metrics::handshake_failed();
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        metrics::connection_closed();
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// The byte stream a connection currently talks over.
#[derive(Debug)]
pub enum Channel {
    Plain(TcpStream),
    Secure(SecureSession),
    /// Nothing left to talk over: the handshake consumed and dropped the stream,
    /// or teardown already ran.
    Closed,
}

/// One accepted client.
#[derive(Debug)]
pub struct Connection {
    peer_addr: SocketAddr,
    channel: Channel,
    guard: ConnectionGuard,
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "connection has no open channel")
}

impl Connection {
    pub fn new(stream: TcpStream, peer_addr: SocketAddr, guard: ConnectionGuard) -> Self {
        Self {
            peer_addr,
            channel: Channel::Plain(stream),
            guard,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.guard.id()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_secure(&self) -> bool {
        matches!(self.channel, Channel::Secure(_))
    }

    /// Upgrade the raw stream to a secure session.
    ///
    /// On failure the channel is left `Closed`: the raw stream went down with
    /// the failed handshake.
    pub async fn secure(
        &mut self,
        context: &SecurityContext,
        timeout: Option<Duration>,
    ) -> Result<(), SessionError> {
        let stream = match std::mem::replace(&mut self.channel, Channel::Closed) {
            Channel::Plain(stream) => stream,
            other => {
                self.channel = other;
                return Ok(());
            }
        };

        match begin_session(stream, context, timeout).await {
            Ok(session) => {
                self.guard.session_begun();
                tracing::debug!(
                    peer_certificates = session.peer_certificates().map_or(0, |c| c.len()),
                    "TLS session established"
                );
                self.channel = Channel::Secure(session);
                Ok(())
            }
            Err(e) => {
                self.guard.handshake_failed();
                Err(e)
            }
        }
    }

    /// Issue a single read into `buf`.
    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.channel {
            Channel::Plain(stream) => stream.read(buf).await,
            Channel::Secure(session) => session.read(buf).await,
            Channel::Closed => Err(not_connected()),
        }
    }

    /// Write all of `bytes` and flush.
    pub async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match &mut self.channel {
            Channel::Plain(stream) => {
                stream.write_all(bytes).await?;
                stream.flush().await
            }
            Channel::Secure(session) => session.write(bytes).await,
            Channel::Closed => Err(not_connected()),
        }
    }

    /// End the secure session (if any) and close the stream.
    ///
    /// Consumes the connection, so it runs once. `deadline` bounds the
    /// close-notify and shutdown flush; when it elapses the socket is dropped
    /// anyway. Failures are logged, never returned.
    pub async fn teardown(mut self, deadline: Option<Duration>) {
        match std::mem::replace(&mut self.channel, Channel::Closed) {
            Channel::Secure(mut session) => {
                match with_deadline(deadline, session.end()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!(error = %e, "Secure session did not shut down cleanly")
                    }
                    Err(_) => tracing::debug!("Secure session close timed out"),
                }
                self.guard.session_ended();
            }
            Channel::Plain(mut stream) => match with_deadline(deadline, stream.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(error = %e, "Stream did not shut down cleanly"),
                Err(_) => tracing::debug!("Stream shutdown timed out"),
            },
            Channel::Closed => {}
        }
        // The socket closes as the channel drops; the guard then records the close.
    }
}
