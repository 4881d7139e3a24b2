//! Builders to construct pools from code or configuration.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::PoolConfig;
use crate::core::ledger::SlotLedger;
use crate::core::{Executor, PoolError, Tag, TagPool, TaskFailure, ThreadExecutor};

/// Fluent builder for a [`TagPool`], covering pool-default callbacks and
/// executor sizing that the plain constructors do not expose.
pub struct TagPoolBuilder<R: Send + 'static> {
    reservations: HashMap<Tag, usize>,
    on_data: Option<Arc<dyn Fn(R) + Send + Sync>>,
    on_error: Option<Arc<dyn Fn(TaskFailure) + Send + Sync>>,
    worker_threads: Option<usize>,
}

impl<R: Send + 'static> TagPoolBuilder<R> {
    /// Start an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reservations: HashMap::new(),
            on_data: None,
            on_error: None,
            worker_threads: None,
        }
    }

    /// Reserve `slots` for `tag`.
    #[must_use]
    pub fn reserve(mut self, tag: impl Into<Tag>, slots: usize) -> Self {
        self.reservations.insert(tag.into(), slots);
        self
    }

    /// Reserve `slots` for the generic overflow group.
    #[must_use]
    pub fn generic_slots(mut self, slots: usize) -> Self {
        self.reservations.insert(Tag::Generic, slots);
        self
    }

    /// Install a pool-default success callback. Successful results are
    /// consumed by it instead of the result queue. Runs on the pool's
    /// result-routing thread and must not block indefinitely.
    #[must_use]
    pub fn on_data(mut self, callback: impl Fn(R) + Send + Sync + 'static) -> Self {
        self.on_data = Some(Arc::new(callback));
        self
    }

    /// Install a pool-default failure callback.
    #[must_use]
    pub fn on_error(mut self, callback: impl Fn(TaskFailure) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Size the default thread executor. Defaults to the CPU count.
    #[must_use]
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = Some(count);
        self
    }

    /// Build over the default thread executor.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] when no slots are reserved.
    pub fn build(self) -> Result<TagPool<R>, PoolError> {
        let workers = self.worker_threads.unwrap_or_else(|| num_cpus::get().max(1));
        self.build_with(ThreadExecutor::new(workers))
    }

    /// Build over a caller-supplied executor.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] when no slots are reserved.
    pub fn build_with<E: Executor<R>>(self, executor: E) -> Result<TagPool<R, E>, PoolError> {
        let ledger = SlotLedger::new(self.reservations);
        if ledger.total_reserved() == 0 {
            return Err(PoolError::InvalidConfig(
                "at least one slot must be reserved".into(),
            ));
        }
        Ok(TagPool::from_parts(
            ledger,
            self.on_data,
            self.on_error,
            executor,
        ))
    }
}

impl<R: Send + 'static> Default for TagPoolBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a pool from a validated [`PoolConfig`].
///
/// # Errors
///
/// Returns [`PoolError::InvalidConfig`] when validation fails.
pub fn build_pool<R: Send + 'static>(cfg: &PoolConfig) -> Result<TagPool<R>, PoolError> {
    cfg.validate().map_err(PoolError::InvalidConfig)?;
    let mut builder = TagPoolBuilder::new();
    for (tag, slots) in cfg.reservation_map() {
        builder = builder.reserve(tag, slots);
    }
    if let Some(count) = cfg.worker_threads {
        builder = builder.worker_threads(count);
    }
    builder.build()
}
