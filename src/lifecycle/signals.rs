//! OS signal handling.
//!
//! SIGINT and SIGTERM stop the accept loop. There is no in-band shutdown.

use std::io;

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;

/// Wait for SIGINT or SIGTERM and return the signal's name.
pub async fn wait_for_termination() -> io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|_| "ctrl-c")
    }
}

/// Spawn a task that triggers `shutdown` on the first termination signal.
pub fn spawn_handler(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        match wait_for_termination().await {
            Ok(signal) => tracing::info!(signal, "Termination signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to install signal handlers; shutting down"),
        }
        shutdown.trigger();
    })
}
