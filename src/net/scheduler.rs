//! Connection scheduling policy.
//!
//! The accept loop hands each connection's work to a [`Scheduler`] and awaits
//! the returned future before accepting again. What that future waits for
//! *is* the policy:
//!
//! - [`Sequential`]: the whole connection. One client in flight, served in
//!   acceptance order.
//! - [`Concurrent`]: a free slot. Each connection runs on its own task, at
//!   most `max_concurrent` at once.
//!
//! The connection handler is the same under both.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::Semaphore;

use crate::config::{SchedulingConfig, SchedulingMode};

/// All work for one connection, including teardown.
pub type ConnectionTask = BoxFuture<'static, ()>;

pub trait Scheduler: Send + Sync {
    /// Take ownership of `task`. The returned future resolves when the accept
    /// loop may accept the next connection.
    fn schedule(&self, task: ConnectionTask) -> BoxFuture<'_, ()>;

    /// Resolve once every scheduled task has finished.
    fn drain(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }

    fn name(&self) -> &'static str;
}

/// Build the scheduler selected by configuration.
pub fn from_config(config: &SchedulingConfig) -> Box<dyn Scheduler> {
    match config.mode {
        SchedulingMode::Sequential => Box::new(Sequential),
        SchedulingMode::Concurrent => Box::new(Concurrent::new(config.max_concurrent)),
    }
}

/// Run each connection to completion before accepting the next.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sequential;

impl Scheduler for Sequential {
    fn schedule(&self, task: ConnectionTask) -> BoxFuture<'_, ()> {
        task
    }

    fn name(&self) -> &'static str {
        "sequential"
    }
}

/// One task per connection, bounded by a semaphore.
#[derive(Debug)]
pub struct Concurrent {
    slots: Arc<Semaphore>,
    max_concurrent: u32,
}

impl Concurrent {
    pub fn new(max_concurrent: u32) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent as usize)),
            max_concurrent,
        }
    }

    /// Slots not currently held by a running connection.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }
}

impl Scheduler for Concurrent {
    fn schedule(&self, task: ConnectionTask) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            // Backpressure: stop accepting while every slot is busy.
            let Ok(permit) = Arc::clone(&self.slots).acquire_owned().await else {
                return;
            };
            tokio::spawn(async move {
                task.await;
                drop(permit);
            });
        })
    }

    fn drain(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Ok(all) = self.slots.acquire_many(self.max_concurrent).await {
                drop(all);
            }
        })
    }

    fn name(&self) -> &'static str {
        "concurrent"
    }
}
