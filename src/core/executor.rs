//! The executor seam and its default thread-backed implementation.
//!
//! The pool assumes nothing about how work runs beyond this contract: an
//! executor receives a job together with a [`Completion`] and must fire the
//! completion exactly once, on any thread, when the job has produced a value
//! or an error. [`Completion`] enforces the exactly-once half mechanically
//! (it can only be fired by value) and covers the never-fired half by
//! reporting an error if it is dropped unfired, so slot accounting settles
//! even against a faulty executor.

mod threads;

pub use threads::ThreadExecutor;

use anyhow::anyhow;
use crossbeam_channel::Sender;

use crate::core::error::TaskResult;
use crate::core::pump::Delivery;
use crate::core::task::{Job, TaskCallbacks, TaskHandle};

/// Runs admitted jobs and reports their outcomes.
///
/// Implementations may run jobs on threads, a process pool, or anything
/// else that can eventually invoke [`Completion::complete`]. Completions
/// may fire on any thread at any time after `run` returns.
pub trait Executor<R: Send + 'static>: Send + Sync + 'static {
    /// Hand a job to the executor. The completion must fire exactly once.
    fn run(&self, job: Job<R>, completion: Completion<R>);

    /// Tear down underlying workers. With `drain`, block until workers have
    /// finished outstanding jobs; otherwise detach them. Must be idempotent.
    fn shutdown(&self, drain: bool);
}

/// One-shot completion handle for an admitted task.
///
/// Firing the completion routes the outcome through the pool's result pump,
/// which releases the task's slot. Dropping an unfired completion delivers
/// an error outcome instead, so a release is never lost.
pub struct Completion<R: Send + 'static> {
    handle: TaskHandle,
    slot: Option<CompletionSlot<R>>,
}

struct CompletionSlot<R: Send + 'static> {
    borrowed: bool,
    callbacks: TaskCallbacks<R>,
    tx: Sender<Delivery<R>>,
}

impl<R: Send + 'static> Completion<R> {
    pub(crate) fn new(
        handle: TaskHandle,
        borrowed: bool,
        callbacks: TaskCallbacks<R>,
        tx: Sender<Delivery<R>>,
    ) -> Self {
        Self {
            handle,
            slot: Some(CompletionSlot {
                borrowed,
                callbacks,
                tx,
            }),
        }
    }

    /// Handle of the task this completion belongs to.
    #[must_use]
    pub const fn handle(&self) -> &TaskHandle {
        &self.handle
    }

    /// Fire the completion with the task's outcome.
    pub fn complete(mut self, outcome: TaskResult<R>) {
        self.deliver(outcome);
    }

    fn deliver(&mut self, outcome: TaskResult<R>) {
        if let Some(slot) = self.slot.take() {
            let delivery = Delivery {
                handle: self.handle.clone(),
                borrowed: slot.borrowed,
                outcome,
                on_data: slot.callbacks.on_data,
                on_error: slot.callbacks.on_error,
            };
            // A closed channel means the pool is already gone; the outcome
            // has nowhere to go.
            let _ = slot.tx.send(delivery);
        }
    }
}

impl<R: Send + 'static> Drop for Completion<R> {
    fn drop(&mut self) {
        if self.slot.is_some() {
            self.deliver(Err(anyhow!("completion dropped without a result")));
        }
    }
}
