//! Error types for pool operations.

use thiserror::Error;

/// Errors produced by pool-level operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Admission was attempted after the pool was stopped.
    #[error("pool has been stopped")]
    Stopped,
    /// A resize against generic slots would leave the generic group below
    /// its current commitments.
    #[error("insufficient generic capacity: requested {requested}, available {available}")]
    InsufficientGeneric {
        /// Generic slots the resize would consume.
        requested: usize,
        /// Generic slots not currently committed to running work.
        available: usize,
    },
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Internal error (background thread panic, channel closed, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result of a user-supplied unit of work, using anyhow for arbitrary
/// task-level failure values.
pub type TaskResult<T> = Result<T, anyhow::Error>;
