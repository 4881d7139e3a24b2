//! Thread-backed executor with resident workers.
//!
//! Workers are dedicated OS threads blocking on a channel; dropping the
//! sender at shutdown unblocks them naturally, so there is no polling
//! anywhere. Concurrency is governed by the pool's admission control, not
//! by the worker count: an admitted job waits in the channel until a worker
//! frees up, and a pool whose total reservation exceeds the worker count
//! simply runs at the worker count.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::anyhow;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::core::error::TaskResult;
use crate::core::executor::{Completion, Executor};
use crate::core::task::{Job, TaskHandle};

struct WorkItem<R: Send + 'static> {
    job: Job<R>,
    completion: Completion<R>,
}

struct Inner<R: Send + 'static> {
    /// Dropping the sender is the shutdown signal for workers.
    job_tx: Mutex<Option<Sender<WorkItem<R>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: AtomicBool,
}

/// Default [`Executor`]: a fixed set of named worker threads.
///
/// A job that panics completes as an error; the worker survives and keeps
/// serving jobs.
pub struct ThreadExecutor<R: Send + 'static> {
    inner: Arc<Inner<R>>,
}

impl<R: Send + 'static> ThreadExecutor<R> {
    /// Spawn `worker_count` resident worker threads (at least one).
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (job_tx, job_rx) = unbounded::<WorkItem<R>>();

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            workers.push(spawn_worker(worker_id, job_rx.clone()));
        }

        debug!(worker_count, "thread executor started");

        Self {
            inner: Arc::new(Inner {
                job_tx: Mutex::new(Some(job_tx)),
                workers: Mutex::new(workers),
                shutdown: AtomicBool::new(false),
            }),
        }
    }
}

impl<R: Send + 'static> Default for ThreadExecutor<R> {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

impl<R: Send + 'static> Executor<R> for ThreadExecutor<R> {
    fn run(&self, job: Job<R>, completion: Completion<R>) {
        let guard = self.inner.job_tx.lock();
        match guard.as_ref() {
            Some(tx) => {
                if let Err(rejected) = tx.send(WorkItem { job, completion }) {
                    rejected
                        .into_inner()
                        .completion
                        .complete(Err(anyhow!("executor is shut down")));
                }
            }
            None => completion.complete(Err(anyhow!("executor is shut down"))),
        }
    }

    fn shutdown(&self, drain: bool) {
        if !self.inner.shutdown.swap(true, Ordering::AcqRel) {
            debug!(drain, "shutting down thread executor");
        }

        // Workers drain whatever is still in the channel, then exit.
        *self.inner.job_tx.lock() = None;

        let mut workers = self.inner.workers.lock();
        if drain {
            for worker in workers.drain(..) {
                if worker.join().is_err() {
                    error!("worker thread panicked outside a job");
                }
            }
        } else if !workers.is_empty() {
            warn!(count = workers.len(), "detaching worker threads");
            workers.clear();
        }
    }
}

impl<R: Send + 'static> Drop for ThreadExecutor<R> {
    fn drop(&mut self) {
        // Workers are detached, not joined; an explicit drain shutdown is
        // the graceful path.
        self.shutdown(false);
    }
}

fn spawn_worker<R: Send + 'static>(
    worker_id: usize,
    job_rx: Receiver<WorkItem<R>>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("tagpool-worker-{worker_id}"))
        .spawn(move || {
            debug!(worker_id, "worker thread started");

            // Blocking recv; returns Err once the sender is dropped.
            while let Ok(WorkItem { job, completion }) = job_rx.recv() {
                let outcome = run_job(job, completion.handle());
                completion.complete(outcome);
            }

            debug!(worker_id, "worker thread exiting");
        })
        .expect("failed to spawn worker thread")
}

fn run_job<R>(job: Job<R>, handle: &TaskHandle) -> TaskResult<R> {
    match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "opaque panic payload".to_string());
            warn!(task = %handle, panic = %msg, "job panicked");
            Err(anyhow!("task panicked: {msg}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tag::Tag;
    use crate::core::task::{TaskCallbacks, TaskHandle};
    use std::time::Duration;

    fn completion_pair(
        id: u64,
    ) -> (
        Completion<i32>,
        crossbeam_channel::Receiver<crate::core::pump::Delivery<i32>>,
    ) {
        let (tx, rx) = unbounded();
        let handle = TaskHandle::new(id, Tag::named("t"));
        (
            Completion::new(handle, false, TaskCallbacks::default(), tx),
            rx,
        )
    }

    #[test]
    fn test_runs_job_and_completes() {
        let executor = ThreadExecutor::new(2);
        let (completion, rx) = completion_pair(1);
        assert_eq!(completion.handle().id(), 1);
        assert_eq!(completion.handle().tag(), &Tag::named("t"));

        executor.run(Box::new(|| Ok(21 * 2)), completion);

        let delivery = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(delivery.outcome.unwrap(), 42);
        executor.shutdown(true);
    }

    #[test]
    fn test_panicking_job_completes_with_error() {
        let executor = ThreadExecutor::new(1);
        let (completion, rx) = completion_pair(2);

        executor.run(Box::new(|| panic!("boom")), completion);

        let delivery = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let err = delivery.outcome.unwrap_err();
        assert!(err.to_string().contains("boom"));

        // The worker survives the panic.
        let (completion, rx) = completion_pair(3);
        executor.run(Box::new(|| Ok(7)), completion);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap().outcome.unwrap(),
            7
        );
        executor.shutdown(true);
    }

    #[test]
    fn test_run_after_shutdown_reports_error() {
        let executor = ThreadExecutor::new(1);
        executor.shutdown(true);

        let (completion, rx) = completion_pair(4);
        executor.run(Box::new(|| Ok(1)), completion);

        let delivery = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(delivery.outcome.is_err());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let executor = ThreadExecutor::<i32>::new(2);
        executor.shutdown(true);
        executor.shutdown(true);
        executor.shutdown(false);
    }

    #[test]
    fn test_dropped_completion_still_delivers() {
        let (completion, rx) = completion_pair(5);
        drop(completion);
        let delivery = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(delivery.outcome.is_err());
    }
}
