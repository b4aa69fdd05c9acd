//! SQLite-backed durable queue.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::pin::pin;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::warn;

use super::error::QueueError;
use super::traits::JobQueue;
use crate::job::JobTask;

/// Default interval at which a blocked dequeue re-checks the table for
/// tasks enqueued by other processes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Durable FIFO queue stored in a `job_queue` table.
///
/// Consumers in the same process are woken immediately on enqueue; tasks
/// written by other processes are picked up on the next poll.
pub struct SqliteJobQueue {
    conn: Mutex<Connection>,
    notify: Notify,
    poll_interval: Duration,
}

impl SqliteJobQueue {
    /// Opens (or creates) the queue table in the database at `path`.
    pub fn new(path: &Path) -> Result<Self, QueueError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::from_connection(conn)
    }

    /// Create an in-memory queue (useful for testing).
    pub fn in_memory() -> Result<Self, QueueError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, QueueError> {
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            notify: Notify::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Sets the cross-process poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    fn initialize_schema(conn: &Connection) -> Result<(), QueueError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS job_queue (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                enqueued_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_job_queue_job_id ON job_queue(job_id);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, QueueError> {
        self.conn
            .lock()
            .map_err(|_| QueueError::Database("queue connection lock poisoned".to_string()))
    }

    /// Pops the head row in a single write transaction.
    fn try_pop(&self) -> Result<Option<JobTask>, QueueError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let head: Option<(i64, String, String)> = tx
            .query_row(
                "SELECT seq, job_id, payload FROM job_queue ORDER BY seq ASC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((seq, job_id, payload)) = head else {
            return Ok(None);
        };

        tx.execute("DELETE FROM job_queue WHERE seq = ?", params![seq])?;
        tx.commit()?;

        match serde_json::from_str(&payload) {
            Ok(task) => Ok(Some(task)),
            Err(e) => {
                warn!("Dropped undecodable queue entry for job {}: {}", job_id, e);
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn enqueue(&self, task: JobTask) -> Result<(), QueueError> {
        let payload = serde_json::to_string(&task)?;
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO job_queue (job_id, payload, enqueued_at) VALUES (?, ?, ?)",
                params![task.job_id, payload, Utc::now().to_rfc3339()],
            )?;
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<JobTask>, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();

            if let Some(task) = self.try_pop()? {
                return Ok(Some(task));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let wait = (deadline - now).min(self.poll_interval);
            let _ = tokio::time::timeout(wait, notified).await;
        }
    }

    async fn len(&self) -> Result<usize, QueueError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM job_queue", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
