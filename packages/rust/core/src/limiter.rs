//! Bounded admission for one class of I/O operation.

use std::future::Future;

use tokio::sync::Semaphore;

use opws_builder_shared::{BuildError, Result};

/// Caps how many operations of one kind are in flight at once.
///
/// Waiters are admitted in FIFO order (tokio's semaphore is fair). A failing
/// operation only fails its own `schedule` call; nothing is ever cancelled.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    name: &'static str,
    semaphore: Semaphore,
}

impl ConcurrencyLimiter {
    /// `capacity` is capped at [`Semaphore::MAX_PERMITS`].
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            semaphore: Semaphore::new(capacity.min(Semaphore::MAX_PERMITS)),
        }
    }

    /// Slots not currently held by a running operation.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a free slot, then drive `operation` to completion while holding it.
    ///
    /// `operation` is not polled before admission.
    pub async fn schedule<F, T>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| BuildError::LimiterClosed(self.name))?;
        operation.await
    }
}
