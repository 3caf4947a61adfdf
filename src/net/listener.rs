//! TCP listener implementation.
//!
//! # Responsibilities
//! - Bind to the configured address with address reuse enabled
//! - Accept incoming TCP connections, one per call
//! - Surface accept errors to the caller, which treats them as fatal

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to create or configure the socket.
    Socket(std::io::Error),
    /// Failed to bind to address.
    Bind(std::io::Error),
    /// Failed to start listening.
    Listen(std::io::Error),
    /// Failed to accept connection.
    Accept(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Socket(e) => write!(f, "Failed to create socket: {}", e),
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Listen(e) => write!(f, "Failed to listen: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Socket(e)
            | ListenerError::Bind(e)
            | ListenerError::Listen(e)
            | ListenerError::Accept(e) => Some(e),
        }
    }
}

/// A TCP listener bound with `SO_REUSEADDR`, so a restarted process can take
/// the port back immediately.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind to the configured address.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr = config.socket_addr().map_err(|e| {
            ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(ListenerError::Socket)?;
        socket.set_reuseaddr(true).map_err(ListenerError::Socket)?;
        socket.bind(addr).map_err(ListenerError::Bind)?;

        let inner = socket.listen(config.backlog).map_err(ListenerError::Listen)?;
        let local_addr = inner.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %local_addr,
            backlog = config.backlog,
            "Listener bound"
        );

        Ok(Self { inner })
    }

    /// Accept the next connection. Blocks until a client connects.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        tracing::debug!(peer_addr = %addr, "Connection accepted");
        Ok((stream, addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}
