//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, address reuse)
//!     → scheduler.rs (sequential or bounded concurrent dispatch)
//!     → tls.rs + session.rs (optional mutual-TLS handshake)
//!     → connection.rs (channel ownership, teardown, lifecycle counters)
//!     → Hand off to HTTP layer
//!
//! Session States:
//!     Unestablished → Handshaking → Established → Closed
//! ```
//!
//! # Design Decisions
//! - TLS is optional; when on, client certificates are mandatory
//! - Plain and secure channels expose the same read/write shape
//! - Teardown consumes the connection so it cannot run twice

pub mod connection;
pub mod listener;
pub mod scheduler;
pub mod session;
pub mod tls;

pub use connection::{Connection, ConnectionTracker, TrackerSnapshot};
pub use listener::{Listener, ListenerError};
pub use scheduler::Scheduler;
pub use session::{SecureSession, SessionError, SessionState};
pub use tls::{SecurityContext, TlsError};
