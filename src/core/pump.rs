//! Result routing: the pump thread between executor completions and the
//! caller-facing delivery surfaces.
//!
//! Each completion is settled in a fixed order: route the outcome (per-task
//! callback, then pool-default callback, then the result queue), release
//! the task's slot, decrement the pending count, and signal waiters. The
//! release deliberately follows the routing so a callback reading the
//! pool's pending count still sees the task it is handling accounted for.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::core::pool::Shared;
use crate::core::task::{DataCallback, ErrorCallback, TaskFailure, TaskHandle};

/// A completed task on its way to the caller.
pub(crate) struct Delivery<R> {
    pub(crate) handle: TaskHandle,
    pub(crate) borrowed: bool,
    pub(crate) outcome: crate::core::error::TaskResult<R>,
    pub(crate) on_data: Option<DataCallback<R>>,
    pub(crate) on_error: Option<ErrorCallback>,
}

/// FIFO of outcomes destined for iterator consumption.
pub(crate) struct ResultQueue<R> {
    queue: Mutex<VecDeque<Result<R, TaskFailure>>>,
    ready: Condvar,
}

impl<R> ResultQueue<R> {
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        }
    }

    fn push(&self, outcome: Result<R, TaskFailure>) {
        self.queue.lock().push_back(outcome);
        self.ready.notify_all();
    }

    /// Pop the next outcome, blocking while the queue is empty and `done`
    /// reads false. Returns `None` once the queue is empty and `done`.
    pub(crate) fn pop_wait(&self, done: impl Fn() -> bool) -> Option<Result<R, TaskFailure>> {
        let mut queue = self.queue.lock();
        loop {
            if let Some(outcome) = queue.pop_front() {
                return Some(outcome);
            }
            if done() {
                return None;
            }
            self.ready.wait(&mut queue);
        }
    }

    /// Wake blocked iterators so they can re-check their end condition.
    pub(crate) fn notify_waiters(&self) {
        let _guard = self.queue.lock();
        self.ready.notify_all();
    }
}

/// Spawn the pump thread. It exits once every delivery sender (the pool's
/// own plus one per in-flight completion) has been dropped.
pub(crate) fn spawn_pump<R: Send + 'static>(
    rx: Receiver<Delivery<R>>,
    shared: Arc<Shared<R>>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("tagpool-pump".to_string())
        .spawn(move || {
            debug!("result pump started");
            while let Ok(delivery) = rx.recv() {
                settle(&shared, delivery);
            }
            debug!("result pump exiting");
        })
        .expect("failed to spawn pump thread")
}

fn settle<R: Send + 'static>(shared: &Shared<R>, delivery: Delivery<R>) {
    let Delivery {
        handle,
        borrowed,
        outcome,
        on_data,
        on_error,
    } = delivery;
    let tag = handle.tag().clone();

    // Step 1: route. Callback panics are contained so the release below
    // always runs.
    match outcome {
        Ok(value) => {
            if let Some(callback) = on_data {
                invoke_guarded(&handle, move || callback(value));
            } else if let Some(callback) = &shared.default_on_data {
                let callback = Arc::clone(callback);
                invoke_guarded(&handle, move || callback(value));
            } else {
                shared.results.push(Ok(value));
            }
        }
        Err(error) => {
            let failure = TaskFailure {
                handle: handle.clone(),
                error,
            };
            if let Some(callback) = on_error {
                invoke_guarded(&handle, move || callback(failure));
            } else if let Some(callback) = &shared.default_on_error {
                let callback = Arc::clone(callback);
                invoke_guarded(&handle, move || callback(failure));
            } else {
                shared.results.push(Err(failure));
            }
        }
    }

    // Steps 2-4: release the slot, settle pending, wake admission and join
    // waiters under the same lock that guarded the admission.
    let remaining = {
        let mut ledger = shared.ledger.lock();
        ledger.release(&tag, borrowed);
        let remaining = shared.pending.fetch_sub(1, Ordering::AcqRel) - 1;
        shared.capacity.notify_all();
        remaining
    };

    if remaining == 0 {
        // Iterators block on the result queue; a drained pool is one of
        // their end conditions.
        shared.results.notify_waiters();
    }
}

fn invoke_guarded(handle: &TaskHandle, callback: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(callback)).is_err() {
        warn!(task = %handle, "result callback panicked");
    }
}
