//! SQLite-backed job store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use super::error::JobError;
use super::settings::ConversionSettings;
use super::store::{page_bounds, JobStore};
use super::types::{Job, JobPage, JobStatus, NewJob};

const JOB_COLUMNS: &str = "id, owner_id, source_location, output_location, source_format, \
     target_format, original_filename, file_size, status, error_message, settings, \
     created_at, updated_at, completed_at";

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Create a new SQLite job store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, JobError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job store (useful for testing).
    pub fn in_memory() -> Result<Self, JobError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                source_location TEXT NOT NULL,
                output_location TEXT,
                source_format TEXT NOT NULL,
                target_format TEXT NOT NULL,
                original_filename TEXT,
                file_size INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                error_message TEXT,
                settings TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_owner_created ON jobs(owner_id, created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_jobs_status_updated ON jobs(status, updated_at);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, JobError> {
        self.conn
            .lock()
            .map_err(|_| JobError::Database("job store lock poisoned".to_string()))
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let status_str: String = row.get(8)?;
        let settings_json: String = row.get(10)?;
        let created_at: String = row.get(11)?;
        let updated_at: String = row.get(12)?;
        let completed_at: Option<String> = row.get(13)?;
        let file_size: i64 = row.get(7)?;

        let status = status_str
            .parse::<JobStatus>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, e.into()))?;
        let settings: ConversionSettings = serde_json::from_str(&settings_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?;

        Ok(Job {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            source_location: row.get(2)?,
            output_location: row.get(3)?,
            source_format: row.get(4)?,
            target_format: row.get(5)?,
            original_filename: row.get(6)?,
            file_size: file_size.max(0) as u64,
            status,
            error_message: row.get(9)?,
            settings,
            created_at: parse_timestamp(11, &created_at)?,
            updated_at: parse_timestamp(12, &updated_at)?,
            completed_at: completed_at
                .map(|s| parse_timestamp(13, &s))
                .transpose()?,
        })
    }

    /// Single-statement status write. With `expected` set the row only
    /// changes while it is still in that status. `None` when nothing changed.
    fn write_status(
        conn: &Connection,
        id: &str,
        expected: Option<JobStatus>,
        status: JobStatus,
        output_location: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<Option<Job>, JobError> {
        let now = format_timestamp(Utc::now());
        let output_location = output_location.filter(|_| status == JobStatus::Completed);
        let error_message = error_message.filter(|_| status == JobStatus::Failed);
        let completed_at = status.is_terminal().then(|| now.clone());

        let changed = match expected {
            Some(expected) => conn.execute(
                "UPDATE jobs SET status = ?, output_location = ?, error_message = ?, updated_at = ?, completed_at = ? WHERE id = ? AND status = ?",
                params![
                    status.as_str(),
                    output_location,
                    error_message,
                    now,
                    completed_at,
                    id,
                    expected.as_str()
                ],
            )?,
            None => conn.execute(
                "UPDATE jobs SET status = ?, output_location = ?, error_message = ?, updated_at = ?, completed_at = ? WHERE id = ?",
                params![
                    status.as_str(),
                    output_location,
                    error_message,
                    now,
                    completed_at,
                    id
                ],
            )?,
        };
        if changed == 0 {
            return Ok(None);
        }
        Self::fetch(conn, id)
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<Job>, JobError> {
        let sql = format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], Self::row_to_job)
            .optional()?)
    }
}

/// Fixed-width UTC timestamps so text comparison matches time order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl JobStore for SqliteJobStore {
    fn create(&self, job: NewJob) -> Result<Job, JobError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let settings_json = serde_json::to_string(&job.settings)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO jobs (id, owner_id, source_location, source_format, target_format, original_filename, file_size, status, settings, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                job.owner_id,
                job.source_location,
                job.source_format,
                job.target_format,
                job.original_filename,
                job.file_size as i64,
                JobStatus::Pending.as_str(),
                settings_json,
                format_timestamp(now),
                format_timestamp(now),
            ],
        )?;

        Ok(Job {
            id,
            owner_id: job.owner_id,
            source_location: job.source_location,
            output_location: None,
            source_format: job.source_format,
            target_format: job.target_format,
            original_filename: job.original_filename,
            file_size: job.file_size,
            status: JobStatus::Pending,
            error_message: None,
            settings: job.settings,
            created_at: now,
            updated_at: now,
            completed_at: None,
        })
    }

    fn get(&self, id: &str, owner_id: &str) -> Result<Job, JobError> {
        let conn = self.conn()?;
        match Self::fetch(&conn, id)? {
            Some(job) if job.owner_id == owner_id => Ok(job),
            _ => Err(JobError::NotFound(id.to_string())),
        }
    }

    fn get_any(&self, id: &str) -> Result<Job, JobError> {
        let conn = self.conn()?;
        Self::fetch(&conn, id)?.ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        output_location: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<Job, JobError> {
        let conn = self.conn()?;
        Self::write_status(&conn, id, None, status, output_location, error_message)?
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    fn update_status_if(
        &self,
        id: &str,
        expected: JobStatus,
        status: JobStatus,
        output_location: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<Option<Job>, JobError> {
        let conn = self.conn()?;
        match Self::write_status(&conn, id, Some(expected), status, output_location, error_message)? {
            Some(job) => Ok(Some(job)),
            None if Self::fetch(&conn, id)?.is_some() => Ok(None),
            None => Err(JobError::NotFound(id.to_string())),
        }
    }

    fn list_by_owner(
        &self,
        owner_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<JobPage, JobError> {
        let (page, page_size, offset) = page_bounds(page, page_size);
        let conn = self.conn()?;

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE owner_id = ?",
            params![owner_id],
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {} FROM jobs WHERE owner_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            JOB_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let jobs = stmt
            .query_map(
                params![owner_id, page_size as i64, offset],
                Self::row_to_job,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(JobPage {
            jobs,
            total,
            page,
            page_size,
        })
    }

    fn list_by_status(
        &self,
        status: JobStatus,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Job>, JobError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM jobs WHERE status = ? AND updated_at < ? ORDER BY updated_at ASC LIMIT ?",
            JOB_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let jobs = stmt
            .query_map(
                params![status.as_str(), format_timestamp(older_than), limit as i64],
                Self::row_to_job,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    fn delete(&self, id: &str) -> Result<(), JobError> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM jobs WHERE id = ?", params![id])?;
        if changed == 0 {
            return Err(JobError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ImageSettings, Rotation};
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;

    fn create_test_store() -> SqliteJobStore {
        SqliteJobStore::in_memory().unwrap()
    }

    fn new_job(owner: &str) -> NewJob {
        NewJob {
            owner_id: owner.to_string(),
            source_location: "2024/05/01/photo_1a2b3c4d.jpeg".to_string(),
            source_format: "jpeg".to_string(),
            target_format: "png".to_string(),
            original_filename: Some("photo.jpeg".to_string()),
            file_size: 2048,
            settings: ConversionSettings::Image(ImageSettings {
                quality: Some(90),
                rotate: Some(Rotation::Quarter),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_create_job() {
        let store = create_test_store();
        let job = store.create(new_job("alice")).unwrap();

        assert!(uuid::Uuid::parse_str(&job.id).is_ok());
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.owner_id, "alice");
        assert!(job.output_location.is_none());
        assert!(job.error_message.is_none());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_get_roundtrips_all_fields() {
        let store = create_test_store();
        let created = store.create(new_job("alice")).unwrap();
        let fetched = store.get(&created.id, "alice").unwrap();

        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.settings, created.settings);
        assert_eq!(fetched.file_size, 2048);
        assert_eq!(fetched.original_filename.as_deref(), Some("photo.jpeg"));
        assert_eq!(
            fetched.created_at.timestamp_micros(),
            created.created_at.timestamp_micros()
        );
    }

    #[test]
    fn test_get_wrong_owner_is_not_found() {
        let store = create_test_store();
        let created = store.create(new_job("alice")).unwrap();

        assert!(matches!(
            store.get(&created.id, "mallory"),
            Err(JobError::NotFound(_))
        ));
        assert!(store.get_any(&created.id).is_ok());
        assert!(matches!(
            store.get_any("missing"),
            Err(JobError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_status_completed() {
        let store = create_test_store();
        let job = store.create(new_job("alice")).unwrap();

        let processing = store
            .update_status(&job.id, JobStatus::Processing, None, None)
            .unwrap();
        assert_eq!(processing.status, JobStatus::Processing);
        assert!(processing.completed_at.is_none());
        assert!(processing.updated_at >= job.updated_at);

        let done = store
            .update_status(
                &job.id,
                JobStatus::Completed,
                Some("out/x.png"),
                Some("ignored"),
            )
            .unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.output_location.as_deref(), Some("out/x.png"));
        assert!(done.error_message.is_none());
        assert!(done.completed_at.is_some());
    }

    #[test]
    fn test_update_status_failed() {
        let store = create_test_store();
        let job = store.create(new_job("alice")).unwrap();
        store
            .update_status(&job.id, JobStatus::Processing, None, None)
            .unwrap();

        let failed = store
            .update_status(&job.id, JobStatus::Failed, Some("stray"), Some("boom"))
            .unwrap();
        assert_eq!(failed.error_message.as_deref(), Some("boom"));
        assert!(failed.output_location.is_none());
        assert!(failed.completed_at.is_some());
    }

    #[test]
    fn test_update_status_missing_job() {
        let store = create_test_store();
        assert!(matches!(
            store.update_status("nope", JobStatus::Processing, None, None),
            Err(JobError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_status_if_only_applies_in_expected_state() {
        let store = create_test_store();
        let job = store.create(new_job("user-1")).unwrap();
        store
            .update_status(&job.id, JobStatus::Processing, None, None)
            .unwrap();
        store
            .update_status(&job.id, JobStatus::Failed, None, Some("interrupted"))
            .unwrap();

        let result = store
            .update_status_if(
                &job.id,
                JobStatus::Processing,
                JobStatus::Completed,
                Some("2024/05/01/out.png"),
                None,
            )
            .unwrap();
        assert!(result.is_none());

        let job = store.get_any(&job.id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("interrupted"));
        assert!(job.output_location.is_none());

        assert!(matches!(
            store.update_status_if("nope", JobStatus::Pending, JobStatus::Processing, None, None),
            Err(JobError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_status_if_applies_when_state_matches() {
        let store = create_test_store();
        let job = store.create(new_job("user-1")).unwrap();

        let updated = store
            .update_status_if(&job.id, JobStatus::Pending, JobStatus::Processing, None, None)
            .unwrap()
            .expect("pending job should move to processing");
        assert_eq!(updated.status, JobStatus::Processing);
        assert!(updated.completed_at.is_none());
    }

    #[test]
    fn test_list_by_owner_paginates_newest_first() {
        let store = create_test_store();
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(store.create(new_job("alice")).unwrap().id);
        }
        store.create(new_job("bob")).unwrap();

        let first = store.list_by_owner("alice", 1, 2).unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.jobs.len(), 2);
        assert_eq!(first.jobs[0].id, ids[4]);
        assert_eq!(first.jobs[1].id, ids[3]);

        let last = store.list_by_owner("alice", 3, 2).unwrap();
        assert_eq!(last.jobs.len(), 1);
        assert_eq!(last.jobs[0].id, ids[0]);

        let beyond = store.list_by_owner("alice", 4, 2).unwrap();
        assert!(beyond.jobs.is_empty());
        assert_eq!(beyond.total, 5);
    }

    #[test]
    fn test_list_by_status_older_than() {
        let store = create_test_store();
        let a = store.create(new_job("alice")).unwrap();
        let b = store.create(new_job("alice")).unwrap();
        store
            .update_status(&a.id, JobStatus::Processing, None, None)
            .unwrap();

        let future = Utc::now() + ChronoDuration::seconds(60);
        let processing = store
            .list_by_status(JobStatus::Processing, future, 10)
            .unwrap();
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].id, a.id);

        let past = Utc::now() - ChronoDuration::seconds(60);
        assert!(store
            .list_by_status(JobStatus::Processing, past, 10)
            .unwrap()
            .is_empty());

        let pending = store.list_by_status(JobStatus::Pending, future, 10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.id);
    }

    #[test]
    fn test_delete() {
        let store = create_test_store();
        let job = store.create(new_job("alice")).unwrap();
        store.delete(&job.id).unwrap();
        assert!(matches!(
            store.get_any(&job.id),
            Err(JobError::NotFound(_))
        ));
        assert!(matches!(store.delete(&job.id), Err(JobError::NotFound(_))));
    }

    #[test]
    fn test_persists_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jobs.db");
        let id = {
            let store = SqliteJobStore::new(&path).unwrap();
            store.create(new_job("alice")).unwrap().id
        };
        let store = SqliteJobStore::new(&path).unwrap();
        assert_eq!(store.get_any(&id).unwrap().status, JobStatus::Pending);
    }
}
