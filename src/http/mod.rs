//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (accept loop, scheduling, shutdown)
//!     → handler.rs (handshake, bounded read, write, teardown)
//!     → request.rs (method + target from the first two tokens)
//!     → response.rs (HTML body, framed 200 response)
//!     → Send to client
//! ```

pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use handler::{ConnectionError, ConnectionHandler};
pub use request::RequestLine;
pub use response::{build_response, max_response_len, ResponseDocument, ServerMode};
pub use server::Server;
