//! Metrics collection and exposition.
//!
//! # Metrics
//! - `tinyserver_connections_total` (counter): accepted connections
//! - `tinyserver_active_connections` (gauge): accepted, not yet torn down
//! - `tinyserver_handshake_failures_total` (counter): rejected TLS handshakes
//! - `tinyserver_responses_total` (counter): responses fully written
//! - `tinyserver_response_bytes_total` (counter): bytes of those responses
//! - `tinyserver_connection_errors_total` (counter, `kind`): abandoned connections
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn connection_accepted() {
    counter!("tinyserver_connections_total").increment(1);
    gauge!("tinyserver_active_connections").increment(1.0);
}

pub fn connection_closed() {
    gauge!("tinyserver_active_connections").decrement(1.0);
}

pub fn handshake_failed() {
    counter!("tinyserver_handshake_failures_total").increment(1);
}

pub fn response_sent(bytes: usize) {
    counter!("tinyserver_responses_total").increment(1);
    counter!("tinyserver_response_bytes_total").increment(bytes as u64);
}

pub fn connection_error(kind: &'static str) {
    counter!("tinyserver_connection_errors_total", "kind" => kind).increment(1);
}
