//! Job queue: FIFO hand-off of [`JobTask`](crate::job::JobTask)s to workers.
//!
//! Two backends are provided. [`SqliteJobQueue`] keeps tasks in the same
//! SQLite database as the job records and survives restarts;
//! [`MemoryJobQueue`] lives in process memory.

mod config;
mod error;
mod memory;
mod sqlite;
mod traits;

pub use config::{create_queue, QueueBackend, QueueConfig};
pub use error::QueueError;
pub use memory::MemoryJobQueue;
pub use sqlite::{SqliteJobQueue, DEFAULT_POLL_INTERVAL};
pub use traits::JobQueue;
