//! Bounded worker pool.
//!
//! At most `capacity` submitted tasks run at once, each on its own tokio
//! task. Callers over capacity wait for a permit with no timeout.

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Errors from the worker pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Worker pool is closed")]
    Closed,

    #[error("Worker task failed: {0}")]
    TaskFailed(String),
}

/// Admission gate and executor for orchestrator runs.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    /// Create a pool running at most `capacity` tasks at once (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot, run `task` on a worker and return its output.
    ///
    /// The slot is held until the task finishes, even if the caller stops
    /// waiting.
    pub async fn submit<F, T>(&self, task: F) -> Result<T, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        tracing::debug!(available = self.permits.available_permits(), "Worker slot acquired");

        let handle = tokio::spawn(async move {
            let _permit = permit;
            task.await
        });

        handle
            .await
            .map_err(|e| PoolError::TaskFailed(e.to_string()))
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
