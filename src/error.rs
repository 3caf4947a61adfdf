//! Top-level error type. Everything here is fatal: the process exits non-zero.

use thiserror::Error;

use crate::config::ConfigError;
use crate::net::{ListenerError, TlsError};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("metrics exporter failed to start: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}
