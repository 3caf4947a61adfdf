//! tinyserver
//!
//! A minimal TCP server: accept a connection, optionally run a mutual-TLS
//! handshake, read one bounded request, answer with a fixed HTML page, close.
//!
//! # Architecture Overview
//!
//! ```text
//!   client ──▶ net::listener ──▶ net::scheduler ──▶ http::handler
//!                                                      │
//!                                  ┌───────────────────┤
//!                                  ▼                   ▼
//!                          net::session (TLS)    raw TcpStream
//!                                  │                   │
//!                                  └─────────┬─────────┘
//!                                            ▼
//!                          http::request → http::response → write → teardown
//! ```
//!
//! Cross-cutting: `config` (immutable `ServerConfig`), `observability`
//! (tracing, metrics), `lifecycle` (startup, signals, shutdown),
//! `resilience` (per-operation timeouts).

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::ServerConfig;
pub use error::ServerError;
pub use http::Server;
pub use lifecycle::Shutdown;
