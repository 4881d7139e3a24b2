//! The public pool: admission, bulk ingestion, live resizing, result
//! iteration, join, and stop.
//!
//! # Design
//!
//! - **One exclusive section**: the slot ledger sits behind a single mutex;
//!   admission, release, and resize all mutate under it, and the paired
//!   condvar wakes admission and join waiters. No polling anywhere.
//! - **Blocking `put` is the backpressure**: `ingest` runs on a background
//!   thread and materialises the next item only after the previous one was
//!   admitted, so an unbounded input stream never piles up task records.
//! - **Results flow through the pump**: completions are routed to callbacks
//!   or the result queue before the slot is released, in completion order,
//!   never submission order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace, warn};

use crate::core::error::{PoolError, TaskResult};
use crate::core::executor::{Completion, Executor, ThreadExecutor};
use crate::core::ledger::{ResizeReport, SlotLedger, TagUsage};
use crate::core::pump::{spawn_pump, Delivery, ResultQueue};
use crate::core::tag::Tag;
use crate::core::task::{Job, TaskCallbacks, TaskFailure, TaskHandle};

/// State shared between the pool facade, ingest threads, and the pump.
pub(crate) struct Shared<R: Send + 'static> {
    pub(crate) ledger: Mutex<SlotLedger>,
    /// Wakes admission waiters (on release/resize) and join waiters (on
    /// pending reaching zero).
    pub(crate) capacity: Condvar,
    pub(crate) results: ResultQueue<R>,
    /// Tasks admitted but not yet routed. Mutated only under the ledger
    /// lock; read lock-free.
    pub(crate) pending: AtomicUsize,
    pub(crate) stopped: AtomicBool,
    pub(crate) next_task_id: AtomicU64,
    pub(crate) delivery_tx: Mutex<Option<Sender<Delivery<R>>>>,
    pub(crate) default_on_data: Option<Arc<dyn Fn(R) + Send + Sync>>,
    pub(crate) default_on_error: Option<Arc<dyn Fn(TaskFailure) + Send + Sync>>,
}

/// Admit one job under `tag`, blocking until a slot frees up, then hand it
/// to the executor. Shared between `put` and the ingest thread.
pub(crate) fn submit_job<R, E>(
    shared: &Arc<Shared<R>>,
    executor: &E,
    tag: Tag,
    job: Job<R>,
    callbacks: TaskCallbacks<R>,
) -> Result<TaskHandle, PoolError>
where
    R: Send + 'static,
    E: Executor<R> + ?Sized,
{
    let admission = {
        let mut ledger = shared.ledger.lock();
        loop {
            if shared.stopped.load(Ordering::Acquire) {
                return Err(PoolError::Stopped);
            }
            if let Some(admission) = ledger.try_admit(&tag) {
                shared.pending.fetch_add(1, Ordering::AcqRel);
                break admission;
            }
            trace!(%tag, "no slot free, waiting");
            shared.capacity.wait(&mut ledger);
        }
    };

    let id = shared.next_task_id.fetch_add(1, Ordering::Relaxed);
    let handle = TaskHandle::new(id, tag.clone());

    let tx = shared.delivery_tx.lock().as_ref().cloned();
    let Some(tx) = tx else {
        // Torn down between admission and dispatch; undo the charge.
        let mut ledger = shared.ledger.lock();
        ledger.release(&tag, admission.borrowed);
        shared.pending.fetch_sub(1, Ordering::AcqRel);
        shared.capacity.notify_all();
        return Err(PoolError::Stopped);
    };

    debug!(task = %handle, borrowed = admission.borrowed, "task admitted");
    let completion = Completion::new(handle.clone(), admission.borrowed, callbacks, tx);
    executor.run(job, completion);
    Ok(handle)
}

/// Tagged, elastic worker pool.
///
/// The pool is partitioned into named groups of reserved execution slots
/// plus a generic overflow group any named group may borrow from. Group
/// sizes can be adjusted while work is in flight, and a blocking
/// ingestion path provides natural backpressure for large or infinite
/// input streams.
///
/// # Example
///
/// ```rust,no_run
/// use tagpool::core::{Tag, TagPool};
/// use std::collections::HashMap;
///
/// let pool: TagPool<u64> = TagPool::new(HashMap::from([
///     (Tag::named("io"), 2),
///     (Tag::Generic, 4),
/// ]))?;
///
/// pool.put("io", || Ok(6 * 7))?;
/// pool.stop(true);
/// for value in &pool {
///     println!("{value}");
/// }
/// # Ok::<(), tagpool::core::PoolError>(())
/// ```
pub struct TagPool<R, E = ThreadExecutor<R>>
where
    R: Send + 'static,
    E: Executor<R>,
{
    shared: Arc<Shared<R>>,
    executor: Arc<E>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl<R: Send + 'static> TagPool<R> {
    /// Create a pool over the default thread executor, sized to the number
    /// of CPUs.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] when the reservation map holds
    /// no slots at all.
    pub fn new(reservations: HashMap<Tag, usize>) -> Result<Self, PoolError> {
        Self::with_executor(reservations, ThreadExecutor::new(num_cpus::get().max(1)))
    }
}

impl<R, E> TagPool<R, E>
where
    R: Send + 'static,
    E: Executor<R>,
{
    /// Create a pool over a caller-supplied executor.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] when the reservation map holds
    /// no slots at all.
    pub fn with_executor(
        reservations: HashMap<Tag, usize>,
        executor: E,
    ) -> Result<Self, PoolError> {
        let ledger = SlotLedger::new(reservations);
        if ledger.total_reserved() == 0 {
            return Err(PoolError::InvalidConfig(
                "at least one slot must be reserved".into(),
            ));
        }
        Ok(Self::from_parts(ledger, None, None, executor))
    }

    pub(crate) fn from_parts(
        ledger: SlotLedger,
        default_on_data: Option<Arc<dyn Fn(R) + Send + Sync>>,
        default_on_error: Option<Arc<dyn Fn(TaskFailure) + Send + Sync>>,
        executor: E,
    ) -> Self {
        let total = ledger.total_reserved();
        let groups = ledger.reserved_snapshot().len();
        let (tx, rx) = unbounded();
        let shared = Arc::new(Shared {
            ledger: Mutex::new(ledger),
            capacity: Condvar::new(),
            results: ResultQueue::new(),
            pending: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
            next_task_id: AtomicU64::new(0),
            delivery_tx: Mutex::new(Some(tx)),
            default_on_data,
            default_on_error,
        });
        let pump = spawn_pump(rx, Arc::clone(&shared));

        info!(groups, total_slots = total, "tag pool started");

        Self {
            shared,
            executor: Arc::new(executor),
            pump: Mutex::new(Some(pump)),
        }
    }

    /// Submit one unit of work under `tag`, blocking until a slot is free.
    ///
    /// Admission consults the tag's own reservation first and the generic
    /// reserve second. Unknown tags are created with a zero reservation,
    /// so they can only borrow.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Stopped`] once the pool has been stopped.
    pub fn put<F>(&self, tag: impl Into<Tag>, work: F) -> Result<TaskHandle, PoolError>
    where
        F: FnOnce() -> TaskResult<R> + Send + 'static,
    {
        self.put_with(tag, work, TaskCallbacks::default())
    }

    /// Submit one unit of work with per-task callbacks.
    ///
    /// A task with a matching callback is consumed by it; only tasks with
    /// no matching callback (per-task or pool-default) reach the result
    /// queue for iteration.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Stopped`] once the pool has been stopped.
    pub fn put_with<F>(
        &self,
        tag: impl Into<Tag>,
        work: F,
        callbacks: TaskCallbacks<R>,
    ) -> Result<TaskHandle, PoolError>
    where
        F: FnOnce() -> TaskResult<R> + Send + 'static,
    {
        submit_job(
            &self.shared,
            &*self.executor,
            tag.into(),
            Box::new(work),
            callbacks,
        )
    }

    /// Submit one task per item of `items`, applying `work` to each, on a
    /// background thread.
    ///
    /// The iterator is consumed lazily: because each submission blocks
    /// until a slot exists, the next item is not materialised before there
    /// is capacity for it. The returned handle reports how many items have
    /// been submitted so far and, via [`IngestHandle::wait`], whether the
    /// whole sequence was submitted.
    pub fn ingest<I, F>(&self, items: I, tag: impl Into<Tag>, work: F) -> IngestHandle
    where
        I: IntoIterator + Send + 'static,
        I::Item: Send + 'static,
        F: Fn(I::Item) -> TaskResult<R> + Send + Sync + 'static,
    {
        let tag = tag.into();
        let shared = Arc::clone(&self.shared);
        let executor = Arc::clone(&self.executor);
        let work = Arc::new(work);
        let submitted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&submitted);

        let thread = thread::Builder::new()
            .name("tagpool-ingest".to_string())
            .spawn(move || {
                for item in items {
                    let work = Arc::clone(&work);
                    let job: Job<R> = Box::new(move || work(item));
                    match submit_job(&shared, &*executor, tag.clone(), job, TaskCallbacks::default())
                    {
                        Ok(_) => {
                            counter.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            warn!(
                                %tag,
                                submitted = counter.load(Ordering::Relaxed),
                                %err,
                                "ingest aborted"
                            );
                            return Err(err);
                        }
                    }
                }
                let count = counter.load(Ordering::Relaxed);
                debug!(%tag, count, "ingest fully submitted");
                Ok(count)
            })
            .expect("failed to spawn ingest thread");

        IngestHandle { submitted, thread }
    }

    /// Change `tag`'s reservation to `new_size` while work is in flight.
    ///
    /// With `use_generic`, the delta is exchanged with the generic reserve
    /// so total capacity is conserved. Shrinking never cancels running
    /// work; surplus tasks finish under their old accounting.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InsufficientGeneric`] in `use_generic` mode
    /// when the generic reserve cannot cover the growth; the ledger is
    /// left untouched.
    pub fn adjust(
        &self,
        tag: impl Into<Tag>,
        new_size: usize,
        use_generic: bool,
    ) -> Result<ResizeReport, PoolError> {
        let tag = tag.into();
        let report = {
            let mut ledger = self.shared.ledger.lock();
            let report = ledger.resize(&tag, new_size, use_generic)?;
            // A grown reservation may unblock admission waiters.
            self.shared.capacity.notify_all();
            report
        };
        info!(
            tag = %report.tag,
            previous = report.previous,
            current = report.current,
            generic = report.generic_reserved,
            "reservation adjusted"
        );
        Ok(report)
    }

    /// Block until no task is pending. Submissions racing `join` are the
    /// caller's own coordination problem.
    pub fn join(&self) {
        let mut ledger = self.shared.ledger.lock();
        while self.shared.pending.load(Ordering::Acquire) > 0 {
            self.shared.capacity.wait(&mut ledger);
        }
    }

    /// Stop the pool. Further submissions fail with
    /// [`PoolError::Stopped`]; in-flight work always runs to completion.
    ///
    /// With `drain`, blocks until pending reaches zero, then tears down
    /// the executor and the result pump. Without it, workers are detached
    /// and outstanding results keep flowing until they settle. Idempotent.
    pub fn stop(&self, drain: bool) {
        let first = {
            let _ledger = self.shared.ledger.lock();
            let first = !self.shared.stopped.swap(true, Ordering::AcqRel);
            self.shared.capacity.notify_all();
            first
        };
        self.shared.results.notify_waiters();
        if first {
            info!(drain, pending = self.pending(), "stopping pool");
        }

        if drain {
            self.join();
        }
        self.executor.shutdown(drain);

        if drain {
            drop(self.shared.delivery_tx.lock().take());
            if let Some(pump) = self.pump.lock().take() {
                if pump.join().is_err() {
                    warn!("result pump panicked");
                }
            }
        }
    }

    /// Iterate completed successful values in completion order.
    ///
    /// Only meaningful when no pool-default data callback is configured
    /// (callbacks consume results before they reach the queue). The
    /// iterator blocks while tasks are pending and ends once the pool is
    /// stopped, drained, and the queue is empty; an idle pool that was
    /// never stopped blocks indefinitely.
    #[must_use]
    pub fn iter(&self) -> ResultIter<'_, R> {
        ResultIter {
            shared: &self.shared,
        }
    }

    /// Number of tasks admitted but not yet routed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Snapshot of every reservation, generic included.
    #[must_use]
    pub fn tags(&self) -> HashMap<Tag, usize> {
        self.shared.ledger.lock().reserved_snapshot()
    }

    /// Current counters for one tag.
    #[must_use]
    pub fn usage(&self, tag: &Tag) -> TagUsage {
        self.shared.ledger.lock().usage(tag)
    }

    /// Whether the pool has been stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }
}

impl<R, E> Drop for TagPool<R, E>
where
    R: Send + 'static,
    E: Executor<R>,
{
    fn drop(&mut self) {
        if !self.shared.stopped.swap(true, Ordering::AcqRel) {
            let _ledger = self.shared.ledger.lock();
            self.shared.capacity.notify_all();
            debug!("pool dropped without explicit stop");
        }
        self.shared.results.notify_waiters();
        self.executor.shutdown(false);
        // Pump exits once the remaining completions settle; it is
        // detached rather than joined here.
        drop(self.shared.delivery_tx.lock().take());
    }
}

/// Blocking iterator over completed successful values.
pub struct ResultIter<'a, R: Send + 'static> {
    shared: &'a Shared<R>,
}

impl<R: Send + 'static> Iterator for ResultIter<'_, R> {
    type Item = R;

    fn next(&mut self) -> Option<R> {
        loop {
            let outcome = self.shared.results.pop_wait(|| {
                self.shared.stopped.load(Ordering::Acquire)
                    && self.shared.pending.load(Ordering::Acquire) == 0
            })?;
            match outcome {
                Ok(value) => return Some(value),
                Err(failure) => {
                    warn!(%failure, "skipping failed outcome in result iteration");
                }
            }
        }
    }
}

impl<'a, R, E> IntoIterator for &'a TagPool<R, E>
where
    R: Send + 'static,
    E: Executor<R>,
{
    type Item = R;
    type IntoIter = ResultIter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Handle to a background ingestion, observable for "all submitted".
pub struct IngestHandle {
    submitted: Arc<AtomicUsize>,
    thread: JoinHandle<Result<usize, PoolError>>,
}

impl IngestHandle {
    /// Items submitted so far.
    #[must_use]
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Block until the whole sequence has been submitted and return the
    /// item count.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Stopped`] when the pool stopped mid-ingest, or
    /// [`PoolError::Internal`] if the ingest thread panicked.
    pub fn wait(self) -> Result<usize, PoolError> {
        self.thread
            .join()
            .map_err(|_| PoolError::Internal("ingest thread panicked".into()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn pool(pairs: &[(Tag, usize)]) -> TagPool<u64> {
        TagPool::with_executor(pairs.iter().cloned().collect(), ThreadExecutor::new(4)).unwrap()
    }

    #[test]
    fn test_put_join_iterate() {
        let pool = pool(&[(Tag::named("sq"), 2), (Tag::Generic, 1)]);
        for n in 1..=3 {
            pool.put("sq", move || Ok(n * n)).unwrap();
        }
        pool.join();
        assert_eq!(pool.pending(), 0);

        pool.stop(true);
        let mut values: Vec<u64> = pool.iter().collect();
        values.sort_unstable();
        assert_eq!(values, vec![1, 4, 9]);
    }

    #[test]
    fn test_put_after_stop_fails() {
        let pool = pool(&[(Tag::Generic, 1)]);
        pool.stop(true);
        let err = pool.put(Tag::Generic, || Ok(0)).unwrap_err();
        assert!(matches!(err, PoolError::Stopped));
    }

    #[test]
    fn test_empty_reservations_rejected() {
        let result: Result<TagPool<u64>, _> = TagPool::new(HashMap::from([(Tag::Generic, 0)]));
        assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn test_failed_task_settles_accounting() {
        let pool = pool(&[(Tag::Generic, 1)]);
        pool.put(Tag::Generic, || Err::<u64, _>(anyhow!("nope")))
            .unwrap();
        pool.join();
        assert_eq!(pool.pending(), 0);
        assert_eq!(pool.usage(&Tag::Generic).in_use, 0);
        pool.stop(true);
        assert_eq!(pool.iter().count(), 0);
    }
}
