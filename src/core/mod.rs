//! Core admission control, slot accounting, and dispatch.

pub mod error;
pub mod executor;
pub mod ledger;
pub mod pool;
pub(crate) mod pump;
pub mod tag;
pub mod task;

pub use error::{PoolError, TaskResult};
pub use executor::{Completion, Executor, ThreadExecutor};
pub use ledger::{Admission, ResizeReport, SlotLedger, TagUsage};
pub use pool::{IngestHandle, ResultIter, TagPool};
pub use tag::Tag;
pub use task::{DataCallback, ErrorCallback, Job, TaskCallbacks, TaskFailure, TaskHandle};
