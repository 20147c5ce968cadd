//! Scheduler backed by `tokio` local tasks.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use tracing::{debug, error};

use super::{BatchQueue, Completion, Scheduler, Task};
use crate::error::Result;

/// Runs each batch on a task spawned with [`tokio::task::spawn_local`] the
/// first time work is queued.
///
/// Must be used from within a [`tokio::task::LocalSet`].
pub struct TaskScheduler {
    queue: BatchQueue,
    scheduled: Cell<bool>,
    this: Weak<TaskScheduler>,
}

impl TaskScheduler {
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            queue: BatchQueue::new(),
            scheduled: Cell::new(false),
            this: this.clone(),
        })
    }

    fn schedule(&self) {
        if self.queue.is_draining() || self.scheduled.replace(true) {
            return;
        }
        let this = self.this.clone();
        tokio::task::spawn_local(async move {
            let Some(scheduler) = this.upgrade() else {
                return;
            };
            if scheduler.scheduled.get() {
                // Errors are logged by perform_updates.
                let _ = scheduler.perform_updates();
            }
        });
        debug!("batch scheduled");
    }
}

impl Scheduler for TaskScheduler {
    fn update_document(&self, task: Task) {
        self.queue.push_update(task);
        self.schedule();
    }

    fn update_document_sync(&self, task: Task) -> Result<()> {
        self.queue.push_update(task);
        self.perform_updates()
    }

    fn read_document(&self, task: Task) {
        self.queue.push_read(task);
        self.schedule();
    }

    fn next_update(&self) -> Completion {
        self.queue.completion()
    }

    fn perform_updates(&self) -> Result<()> {
        if !self.queue.is_draining() {
            self.scheduled.set(false);
        }
        let result = self.queue.drain();
        if let Err(err) = &result {
            error!(%err, "scheduled update failed");
            if self.queue.has_work() {
                self.schedule();
            }
        }
        result
    }
}
