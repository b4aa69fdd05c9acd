//! In-process queue backed by a `VecDeque`.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::error::QueueError;
use super::traits::JobQueue;
use crate::job::JobTask;

/// Non-durable queue for tests and single-process deployments.
pub struct MemoryJobQueue {
    tasks: Mutex<VecDeque<JobTask>>,
    notify: Notify,
    closed: AtomicBool,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Stops accepting new tasks. Tasks already queued can still be dequeued.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn tasks(&self) -> MutexGuard<'_, VecDeque<JobTask>> {
        // A VecDeque cannot be left half-updated by a panic elsewhere.
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    fn name(&self) -> &str {
        "memory"
    }

    async fn enqueue(&self, task: JobTask) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }
        self.tasks().push_back(task);
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<JobTask>, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before checking so an enqueue between the
            // check and the wait is not missed.
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();

            let next = self.tasks().pop_front();
            if let Some(task) = next {
                return Ok(Some(task));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.tasks().len())
    }
}
