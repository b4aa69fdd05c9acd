//! Trait definitions for the queue module.

use async_trait::async_trait;
use std::time::Duration;

use super::error::QueueError;
use crate::job::JobTask;

/// FIFO hand-off of tasks between submitters and workers.
///
/// A dequeued task is removed from the queue at hand-off, so each task is
/// claimed by exactly one consumer.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Returns the name of this queue backend.
    fn name(&self) -> &str;

    /// Appends a task to the tail of the queue.
    async fn enqueue(&self, task: JobTask) -> Result<(), QueueError>;

    /// Removes and returns the head task, waiting up to `timeout` for one
    /// to arrive. Returns `Ok(None)` if the wait expires.
    async fn dequeue(&self, timeout: Duration) -> Result<Option<JobTask>, QueueError>;

    /// Number of tasks waiting.
    async fn len(&self) -> Result<usize, QueueError>;

    async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }
}
