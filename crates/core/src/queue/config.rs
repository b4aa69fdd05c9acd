//! Configuration for the queue module.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::error::QueueError;
use super::memory::MemoryJobQueue;
use super::sqlite::SqliteJobQueue;
use super::traits::JobQueue;

/// Which queue backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    /// Durable table in the job database.
    #[default]
    Sqlite,
    /// Process-local; tasks are lost on restart.
    Memory,
}

/// Queue section of the configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub backend: QueueBackend,
    /// How often a waiting consumer re-checks for tasks written by other
    /// processes (sqlite only).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::default(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Builds the queue selected in `config`. The sqlite queue lives in the
/// database file at `db_path`.
pub fn create_queue(config: &QueueConfig, db_path: &Path) -> Result<Arc<dyn JobQueue>, QueueError> {
    match config.backend {
        QueueBackend::Sqlite => Ok(Arc::new(
            SqliteJobQueue::new(db_path)?
                .with_poll_interval(Duration::from_millis(config.poll_interval_ms)),
        )),
        QueueBackend::Memory => Ok(Arc::new(MemoryJobQueue::new())),
    }
}
