//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
///
/// Built once at startup and handed to the listener and connection handler.
/// Nothing reads the security mode from anywhere else.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, backlog).
    pub listener: ListenerConfig,

    /// Transport security settings.
    pub tls: TlsConfig,

    /// Request and response size limits.
    pub limits: LimitsConfig,

    /// Per-connection timeouts.
    pub timeouts: TimeoutConfig,

    /// How accepted connections are scheduled.
    pub scheduling: SchedulingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Pending-connection queue length passed to `listen(2)`. Defaults to 128
    /// rather than 1, so clients that arrive while a sequential server is busy
    /// wait in the queue instead of being refused.
    pub backlog: u32,
}

impl ListenerConfig {
    /// Resolve host and port into a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        let ip: IpAddr = self.host.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            backlog: 128,
        }
    }
}

/// TLS configuration for the listener.
///
/// When enabled, clients must present a certificate signed by `ca_path`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TlsConfig {
    /// Serve over TLS. Disabled only by explicit request.
    pub enabled: bool,

    /// Path to the server certificate chain (PEM).
    pub cert_path: PathBuf,

    /// Path to the server private key (PEM).
    pub key_path: PathBuf,

    /// Path to the CA certificate that client certificates must chain to (PEM).
    pub ca_path: PathBuf,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cert_path: PathBuf::from("server.crt"),
            key_path: PathBuf::from("server.key"),
            ca_path: PathBuf::from("ca.crt"),
        }
    }
}

/// Request and response size limits.
///
/// Token bounds count a terminator byte, so a bound of 16 keeps at most
/// 15 bytes of the method.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Size of the request buffer. One byte is reserved, so at most
    /// `request_buffer_bytes - 1` bytes are read per request.
    pub request_buffer_bytes: usize,

    /// Bound for the method token, terminator included.
    pub method_bound: usize,

    /// Bound for the target token, terminator included.
    pub target_bound: usize,

    /// Largest framed response the server will send.
    pub max_response_bytes: usize,
}

impl LimitsConfig {
    /// Number of request bytes a single read may consume.
    pub fn readable_request_bytes(&self) -> usize {
        self.request_buffer_bytes.saturating_sub(1)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            request_buffer_bytes: 4096,
            method_bound: 16,
            target_bound: 256,
            max_response_bytes: 4096,
        }
    }
}

/// Timeout configuration for per-connection operations.
///
/// Every timeout is optional; an unset timeout lets a silent peer hold the
/// connection indefinitely.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// TLS handshake timeout in seconds.
    pub handshake_secs: Option<u64>,

    /// Request read timeout in seconds.
    pub read_secs: Option<u64>,

    /// Response write timeout in seconds.
    pub write_secs: Option<u64>,
}

impl TimeoutConfig {
    pub fn handshake(&self) -> Option<Duration> {
        self.handshake_secs.map(Duration::from_secs)
    }

    pub fn read(&self) -> Option<Duration> {
        self.read_secs.map(Duration::from_secs)
    }

    pub fn write(&self) -> Option<Duration> {
        self.write_secs.map(Duration::from_secs)
    }
}

/// Connection scheduling policy.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingMode {
    /// One connection at a time, in acceptance order.
    #[default]
    Sequential,
    /// One task per connection, bounded by `max_concurrent`.
    Concurrent,
}

/// Scheduling configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Scheduling policy.
    pub mode: SchedulingMode,

    /// Maximum in-flight connections in concurrent mode.
    pub max_concurrent: u32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            mode: SchedulingMode::Sequential,
            max_concurrent: 64,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ServerConfig::default();
        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.listener.backlog, 128);
        assert!(config.tls.enabled);
        assert_eq!(config.tls.cert_path, PathBuf::from("server.crt"));
        assert_eq!(config.tls.key_path, PathBuf::from("server.key"));
        assert_eq!(config.tls.ca_path, PathBuf::from("ca.crt"));
        assert_eq!(config.limits.request_buffer_bytes, 4096);
        assert_eq!(config.limits.readable_request_bytes(), 4095);
        assert_eq!(config.limits.method_bound, 16);
        assert_eq!(config.limits.target_bound, 256);
        assert_eq!(config.scheduling.mode, SchedulingMode::Sequential);
        assert_eq!(config.timeouts.handshake(), None);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [listener]
            port = 9443

            [timeouts]
            read_secs = 5

            [scheduling]
            mode = "concurrent"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.port, 9443);
        assert_eq!(config.listener.host, "0.0.0.0");
        assert_eq!(config.timeouts.read(), Some(Duration::from_secs(5)));
        assert_eq!(config.timeouts.write(), None);
        assert_eq!(config.scheduling.mode, SchedulingMode::Concurrent);
        assert_eq!(config.scheduling.max_concurrent, 64);
        assert!(config.tls.enabled);
    }

    #[test]
    fn socket_addr_handles_ipv6() {
        let listener = ListenerConfig {
            host: "::1".to_string(),
            port: 8443,
            backlog: 16,
        };
        assert_eq!(listener.socket_addr().unwrap().to_string(), "[::1]:8443");
    }
}
