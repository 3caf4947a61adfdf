//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! requirements. All errors are collected, not just the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::http::request::TokenBounds;
use crate::http::response::max_response_len;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.host '{0}' is not an IP address")]
    InvalidHost(String),

    #[error("listener.backlog must be greater than zero")]
    ZeroBacklog,

    #[error("tls.{0} must be set when TLS is enabled")]
    MissingTlsPath(&'static str),

    #[error("limits.request_buffer_bytes must be at least 2 (got {0})")]
    RequestBufferTooSmall(usize),

    #[error("limits.{field} must be at least 1 (got {value})")]
    TokenBoundTooSmall { field: &'static str, value: usize },

    #[error("limits.max_response_bytes must be greater than zero")]
    ZeroResponseLimit,

    #[error(
        "limits.max_response_bytes ({limit}) is below the largest response the token bounds allow ({worst_case})"
    )]
    ResponseLimitTooSmall { worst_case: usize, limit: usize },

    #[error("timeouts.{0} must be greater than zero when set")]
    ZeroTimeout(&'static str),

    #[error("scheduling.max_concurrent must be greater than zero")]
    ZeroConcurrency,

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check a configuration before it is accepted into the system.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.socket_addr().is_err() {
        errors.push(ValidationError::InvalidHost(config.listener.host.clone()));
    }
    if config.listener.backlog == 0 {
        errors.push(ValidationError::ZeroBacklog);
    }

    if config.tls.enabled {
        let paths = [
            ("cert_path", &config.tls.cert_path),
            ("key_path", &config.tls.key_path),
            ("ca_path", &config.tls.ca_path),
        ];
        for (name, path) in paths {
            if path.as_os_str().is_empty() {
                errors.push(ValidationError::MissingTlsPath(name));
            }
        }
    }

    let limits = &config.limits;
    if limits.request_buffer_bytes < 2 {
        errors.push(ValidationError::RequestBufferTooSmall(limits.request_buffer_bytes));
    }
    for (field, value) in [
        ("method_bound", limits.method_bound),
        ("target_bound", limits.target_bound),
    ] {
        if value == 0 {
            errors.push(ValidationError::TokenBoundTooSmall { field, value });
        }
    }
    if limits.max_response_bytes == 0 {
        errors.push(ValidationError::ZeroResponseLimit);
    } else {
        // Every request must be answerable, even one with both tokens at their bounds.
        let worst_case = max_response_len(TokenBounds::from(limits));
        if worst_case > limits.max_response_bytes {
            errors.push(ValidationError::ResponseLimitTooSmall {
                worst_case,
                limit: limits.max_response_bytes,
            });
        }
    }

    for (name, value) in [
        ("handshake_secs", config.timeouts.handshake_secs),
        ("read_secs", config.timeouts.read_secs),
        ("write_secs", config.timeouts.write_secs),
    ] {
        if value == Some(0) {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    if config.scheduling.max_concurrent == 0 {
        errors.push(ValidationError::ZeroConcurrency);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
