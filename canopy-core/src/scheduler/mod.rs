//! Update Scheduling
//!
//! Components do not patch the platform the moment they change. They hand a
//! task to a [`Scheduler`], which runs queued tasks in batches, so that many
//! update requests in one turn produce one patch per component.
//!
//! # Batches
//!
//! A batch runs every queued update task, then every read task, repeating
//! until both queues are empty. Tasks may enqueue more tasks while the batch
//! runs; they join the same batch. Reads (`read_after_update` hooks) therefore
//! always observe the platform after all writes of the batch have landed.
//!
//! When a task fails the batch stops. The remaining tasks stay queued and the
//! error is handed back to whoever drove the batch.
//!
//! # Completion
//!
//! [`Scheduler::next_update`] returns a future that resolves when the next
//! batch has been fully drained. Completion is tracked with a
//! `tokio::sync::watch` generation counter bumped after each batch.
//!
//! # Implementations
//!
//! - [`FrameScheduler`]: runs a batch when the embedder calls
//!   [`Scheduler::perform_updates`], typically from a frame callback.
//! - [`TaskScheduler`]: runs a batch from a `tokio` local task spawned on
//!   first enqueue.

mod frame;
mod task;

pub use frame::FrameScheduler;
pub use task::TaskScheduler;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use futures_util::future::{FutureExt, LocalBoxFuture};
use tokio::sync::watch;

use crate::error::Result;

/// Work queued with a scheduler.
pub type Task = Box<dyn FnOnce() -> Result<()>>;

/// Resolves when a batch has completed.
pub type Completion = LocalBoxFuture<'static, ()>;

/// Batches document updates.
pub trait Scheduler {
    /// Queue a write. It runs in the next batch.
    fn update_document(&self, task: Task);

    /// Queue a write and run a batch now.
    fn update_document_sync(&self, task: Task) -> Result<()>;

    /// Queue a read. Reads run once all queued writes of the batch are done.
    fn read_document(&self, task: Task);

    /// Resolves after the next batch completes.
    fn next_update(&self) -> Completion;

    /// Run a batch: drain all queued writes and reads.
    fn perform_updates(&self) -> Result<()>;
}

/// An already resolved completion.
pub fn ready() -> Completion {
    futures_util::future::ready(()).boxed_local()
}

/// Update and read queues shared by the scheduler implementations.
pub(crate) struct BatchQueue {
    updates: RefCell<VecDeque<Task>>,
    reads: RefCell<VecDeque<Task>>,
    depth: Cell<usize>,
    generation: watch::Sender<u64>,
}

impl BatchQueue {
    pub(crate) fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            updates: RefCell::new(VecDeque::new()),
            reads: RefCell::new(VecDeque::new()),
            depth: Cell::new(0),
            generation,
        }
    }

    pub(crate) fn push_update(&self, task: Task) {
        self.updates.borrow_mut().push_back(task);
    }

    pub(crate) fn push_read(&self, task: Task) {
        self.reads.borrow_mut().push_back(task);
    }

    pub(crate) fn has_work(&self) -> bool {
        !self.updates.borrow().is_empty() || !self.reads.borrow().is_empty()
    }

    /// Whether a batch is currently running.
    pub(crate) fn is_draining(&self) -> bool {
        self.depth.get() > 0
    }

    #[cfg(test)]
    pub(crate) fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Run queued tasks until both queues are empty. Only the outermost
    /// drain completes the batch.
    pub(crate) fn drain(&self) -> Result<()> {
        self.depth.set(self.depth.get() + 1);
        let result = self.run_until_empty();
        let depth = self.depth.get() - 1;
        self.depth.set(depth);

        if depth == 0 && result.is_ok() {
            self.generation.send_modify(|generation| *generation += 1);
        }
        result
    }

    fn run_until_empty(&self) -> Result<()> {
        loop {
            let update = self.updates.borrow_mut().pop_front();
            if let Some(task) = update {
                task()?;
                continue;
            }
            let read = self.reads.borrow_mut().pop_front();
            match read {
                Some(task) => task()?,
                None => return Ok(()),
            }
        }
    }

    /// Resolves once the generation counter moves past its current value.
    pub(crate) fn completion(&self) -> Completion {
        let mut receiver = self.generation.subscribe();
        let target = *receiver.borrow() + 1;
        async move {
            // A dropped sender means the scheduler is gone; nothing will run.
            let _ = receiver.wait_for(|generation| *generation >= target).await;
        }
        .boxed_local()
    }
}
