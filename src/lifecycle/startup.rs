//! Startup orchestration.
//!
//! Order: metrics → security context → listener → serve. Configuration and
//! logging are set up by the binary before this runs.
//!
//! Fail fast: any startup error is fatal and the server never starts
//! listening with a half-configured security context.

use crate::config::{loader, ServerConfig};
use crate::error::ServerError;
use crate::http::Server;
use crate::lifecycle::{signals, Shutdown};
use crate::net::{Listener, SecurityContext};
use crate::observability::metrics;

/// Load credentials when TLS is enabled.
pub fn prepare_security(config: &ServerConfig) -> Result<Option<SecurityContext>, ServerError> {
    if !config.tls.enabled {
        tracing::warn!("TLS is disabled; serving plain text");
        return Ok(None);
    }
    Ok(Some(SecurityContext::from_config(&config.tls)?))
}

/// Build the server and bind its listener without serving yet.
pub async fn prepare(config: &ServerConfig) -> Result<(Server, Listener), ServerError> {
    loader::ensure_valid(config)?;

    let security = prepare_security(config)?;
    let server = Server::new(config, security);
    let listener = Listener::bind(&config.listener).await?;
    Ok((server, listener))
}

/// Start everything and serve until a termination signal arrives.
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| ServerError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let (server, listener) = prepare(&config).await?;

    let shutdown = Shutdown::new();
    let _signals = signals::spawn_handler(shutdown.clone());

    server.run(listener, shutdown.subscribe()).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
