//! Error types for the queue module.

use thiserror::Error;

/// Errors returned by a [`JobQueue`](super::JobQueue).
///
/// An empty queue at the end of a blocking dequeue is not an error; it is
/// reported as `Ok(None)`.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue database error: {0}")]
    Database(String),

    /// A task could not be encoded or a stored payload could not be decoded.
    #[error("Queue payload error: {0}")]
    Serialization(String),

    /// The queue no longer accepts tasks.
    #[error("Queue is closed")]
    Closed,
}

impl From<rusqlite::Error> for QueueError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
