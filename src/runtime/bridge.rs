//! Async wrappers over the blocking pool surface.
//!
//! Every blocking wait in the pool parks on a condvar; these adapters move
//! that wait onto tokio's blocking thread pool so async callers never stall
//! a runtime worker.

use std::sync::Arc;

use crate::core::{Executor, PoolError, Tag, TagPool, TaskHandle, TaskResult};

impl<R, E> TagPool<R, E>
where
    R: Send + 'static,
    E: Executor<R>,
{
    /// Async [`put`](TagPool::put): admission waits run on the blocking
    /// thread pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Stopped`] once the pool has been stopped, or
    /// [`PoolError::Internal`] if the blocking task was cancelled.
    pub async fn put_async<F>(
        self: &Arc<Self>,
        tag: impl Into<Tag> + Send,
        work: F,
    ) -> Result<TaskHandle, PoolError>
    where
        F: FnOnce() -> TaskResult<R> + Send + 'static,
    {
        let pool = Arc::clone(self);
        let tag = tag.into();
        tokio::task::spawn_blocking(move || pool.put(tag, work))
            .await
            .map_err(|e| PoolError::Internal(format!("blocking task failed: {e}")))?
    }

    /// Async [`join`](TagPool::join).
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Internal`] if the blocking task was cancelled.
    pub async fn join_async(self: &Arc<Self>) -> Result<(), PoolError> {
        let pool = Arc::clone(self);
        tokio::task::spawn_blocking(move || pool.join())
            .await
            .map_err(|e| PoolError::Internal(format!("blocking task failed: {e}")))
    }

    /// Async [`stop`](TagPool::stop).
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Internal`] if the blocking task was cancelled.
    pub async fn stop_async(self: &Arc<Self>, drain: bool) -> Result<(), PoolError> {
        let pool = Arc::clone(self);
        tokio::task::spawn_blocking(move || pool.stop(drain))
            .await
            .map_err(|e| PoolError::Internal(format!("blocking task failed: {e}")))
    }
}
