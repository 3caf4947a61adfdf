//! Server accept loop.
//!
//! # Responsibilities
//! - Accept connections from the listener
//! - Hand each one to the scheduler wrapped in the connection handler
//! - Stop accepting on shutdown, then wait for in-flight connections
//! - Treat accept failures as fatal

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::ServerConfig;
use crate::http::handler::ConnectionHandler;
use crate::http::response::ServerMode;
use crate::net::connection::{Connection, ConnectionTracker};
use crate::net::listener::{Listener, ListenerError};
use crate::net::scheduler::{self, Scheduler};
use crate::net::tls::SecurityContext;

/// The request-serving server.
pub struct Server {
    handler: Arc<ConnectionHandler>,
    scheduler: Box<dyn Scheduler>,
    tracker: ConnectionTracker,
}

impl Server {
    /// Create a server. Pass a security context exactly when TLS is enabled.
    pub fn new(config: &ServerConfig, security: Option<SecurityContext>) -> Self {
        Self {
            handler: Arc::new(ConnectionHandler::new(config, security)),
            scheduler: scheduler::from_config(&config.scheduling),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Replace the scheduling policy.
    pub fn with_scheduler(mut self, scheduler: Box<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Lifecycle counters for every connection this server accepts.
    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    pub fn mode(&self) -> ServerMode {
        self.handler.mode()
    }

    /// Run the server until shutdown or a fatal accept error.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        match listener.local_addr() {
            Ok(addr) => tracing::info!(
                address = %addr,
                mode = self.mode().label(),
                scheduler = self.scheduler.name(),
                "Server listening"
            ),
            Err(e) => tracing::warn!(error = %e, "Could not read listener address"),
        }

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::error!(error = %e, "Accept failed; listener cannot recover");
                            return Err(e);
                        }
                    };
                    let connection = Connection::new(stream, peer_addr, self.tracker.track());
                    let handler = Arc::clone(&self.handler);
                    self.scheduler.schedule(Box::pin(handler.serve(connection))).await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        self.scheduler.drain().await;
        let snapshot = self.tracker.snapshot();
        tracing::info!(
            accepted = snapshot.accepted,
            closed = snapshot.closed,
            handshake_failures = snapshot.handshake_failures,
            "Server stopped"
        );
        Ok(())
    }
}
