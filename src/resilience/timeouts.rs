//! Timeout enforcement.
//!
//! Per-connection deadlines for the handshake, the request read and the
//! response write. A `None` limit waits forever, which is the default.

use std::future::Future;
use std::time::Duration;

use tokio::time::error::Elapsed;

/// Await `fut`, giving up after `limit` when one is set.
pub async fn with_deadline<F>(limit: Option<Duration>, fut: F) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await,
        None => Ok(fut.await),
    }
}
