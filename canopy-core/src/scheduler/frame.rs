//! Frame-driven scheduler.

use std::cell::Cell;
use std::fmt;

use tracing::{debug, error};

use super::{BatchQueue, Completion, Scheduler, Task};
use crate::error::Result;

type FrameRequester = Box<dyn Fn()>;

/// Default scheduler. Queued tasks run when the embedder calls
/// [`Scheduler::perform_updates`].
///
/// An optional frame requester is called once per batch, the first time work
/// is queued after the previous batch ran, so the embedder can schedule a
/// frame callback instead of polling.
pub struct FrameScheduler {
    queue: BatchQueue,
    requester: Option<FrameRequester>,
    frame_pending: Cell<bool>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self {
            queue: BatchQueue::new(),
            requester: None,
            frame_pending: Cell::new(false),
        }
    }

    /// A scheduler that asks for a frame through `requester`.
    pub fn with_requester(requester: impl Fn() + 'static) -> Self {
        Self {
            requester: Some(Box::new(requester)),
            ..Self::new()
        }
    }

    /// Whether a frame has been requested and not yet performed.
    pub fn frame_pending(&self) -> bool {
        self.frame_pending.get()
    }

    /// Whether tasks are waiting for the next batch.
    pub fn has_pending_work(&self) -> bool {
        self.queue.has_work()
    }

    fn request_frame(&self) {
        if self.frame_pending.replace(true) {
            return;
        }
        debug!("requesting frame");
        if let Some(requester) = &self.requester {
            requester();
        }
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("frame_pending", &self.frame_pending.get())
            .field("has_pending_work", &self.queue.has_work())
            .finish()
    }
}

impl Scheduler for FrameScheduler {
    fn update_document(&self, task: Task) {
        self.queue.push_update(task);
        if !self.queue.is_draining() {
            self.request_frame();
        }
    }

    fn update_document_sync(&self, task: Task) -> Result<()> {
        self.queue.push_update(task);
        self.perform_updates()
    }

    fn read_document(&self, task: Task) {
        self.queue.push_read(task);
        if !self.queue.is_draining() {
            self.request_frame();
        }
    }

    fn next_update(&self) -> Completion {
        self.queue.completion()
    }

    fn perform_updates(&self) -> Result<()> {
        if !self.queue.is_draining() {
            self.frame_pending.set(false);
        }
        let result = self.queue.drain();
        if let Err(err) = &result {
            error!(%err, "scheduled update failed");
            if self.queue.has_work() {
                self.request_frame();
            }
        }
        result
    }
}
