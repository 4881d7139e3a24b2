//! Task records, handles, and callback plumbing.

use std::fmt;

use crate::core::error::TaskResult;
use crate::core::tag::Tag;

/// A boxed unit of work submitted to the pool.
pub type Job<R> = Box<dyn FnOnce() -> TaskResult<R> + Send + 'static>;

/// Per-task success callback, consuming the task's value.
pub type DataCallback<R> = Box<dyn FnOnce(R) + Send + 'static>;

/// Per-task failure callback, consuming the task's failure.
pub type ErrorCallback = Box<dyn FnOnce(TaskFailure) + Send + 'static>;

/// Opaque handle identifying an admitted task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    id: u64,
    tag: Tag,
}

impl TaskHandle {
    pub(crate) const fn new(id: u64, tag: Tag) -> Self {
        Self { id, tag }
    }

    /// Pool-unique task id, assigned at admission.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The tag this task was admitted under.
    #[must_use]
    pub const fn tag(&self) -> &Tag {
        &self.tag
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task {} [{}]", self.id, self.tag)
    }
}

/// A failed task outcome, carrying the originating handle and the error
/// value produced by (or on behalf of) the unit of work.
#[derive(Debug)]
pub struct TaskFailure {
    /// Handle of the failed task.
    pub handle: TaskHandle,
    /// The failure value.
    pub error: anyhow::Error,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.handle, self.error)
    }
}

/// Optional per-task callbacks supplied at submission.
///
/// A task with a callback never reaches the pool's result queue: the
/// matching callback consumes its outcome instead. Callbacks run on the
/// pool's result-routing thread and must not block indefinitely, or they
/// stall delivery for every other task.
pub struct TaskCallbacks<R> {
    /// Invoked with the value on success.
    pub on_data: Option<DataCallback<R>>,
    /// Invoked with the failure on error.
    pub on_error: Option<ErrorCallback>,
}

impl<R> TaskCallbacks<R> {
    /// Callbacks routing success values to `f`.
    #[must_use]
    pub fn on_data(f: impl FnOnce(R) + Send + 'static) -> Self {
        Self {
            on_data: Some(Box::new(f)),
            on_error: None,
        }
    }

    /// Callbacks routing failures to `f`.
    #[must_use]
    pub fn on_error(f: impl FnOnce(TaskFailure) + Send + 'static) -> Self {
        Self {
            on_data: None,
            on_error: Some(Box::new(f)),
        }
    }
}

impl<R> Default for TaskCallbacks<R> {
    fn default() -> Self {
        Self {
            on_data: None,
            on_error: None,
        }
    }
}

impl<R> fmt::Debug for TaskCallbacks<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCallbacks")
            .field("on_data", &self.on_data.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
