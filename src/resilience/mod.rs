//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Handshake / request read / response write
//!     → timeouts.rs (optional per-operation deadline)
//!     → elapsed: connection abandoned, listener keeps serving
//! ```
//!
//! # Design Decisions
//! - Timeouts are opt-in; with none configured a silent peer stalls a
//!   sequential server
//! - Timeout errors are distinct from I/O errors in logs and metrics

pub mod timeouts;
