//! Job storage trait.

use chrono::{DateTime, Utc};

use super::error::JobError;
use super::types::{Job, JobPage, JobStatus, NewJob};

/// Default number of jobs per page when the caller passes 0.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Upper bound on the page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Durable record of jobs.
///
/// Implementations must be safe to share between workers.
/// [`update_status`](Self::update_status) is last-write-wins; writers that
/// race with other writers (workers, the recovery sweep) use
/// [`update_status_if`](Self::update_status_if) instead.
pub trait JobStore: Send + Sync {
    /// Inserts a new `pending` job with a fresh id.
    fn create(&self, job: NewJob) -> Result<Job, JobError>;

    /// Gets a job owned by `owner_id`. A job owned by someone else is
    /// reported as not found.
    fn get(&self, id: &str, owner_id: &str) -> Result<Job, JobError>;

    /// Gets a job regardless of owner.
    fn get_any(&self, id: &str) -> Result<Job, JobError>;

    /// Sets the status, stamping `updated_at` and, on entering a terminal
    /// state, `completed_at`. The output location is kept only for
    /// `completed` and the error message only for `failed`.
    fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        output_location: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<Job, JobError>;

    /// Like [`update_status`](Self::update_status), but only applied while
    /// the job is still in `expected`, checked and written atomically.
    ///
    /// Returns `Ok(None)` when the job has already moved on, and
    /// `NotFound` when it does not exist.
    fn update_status_if(
        &self,
        id: &str,
        expected: JobStatus,
        status: JobStatus,
        output_location: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<Option<Job>, JobError>;

    /// Lists an owner's jobs, newest first. `page` is 1-based.
    fn list_by_owner(&self, owner_id: &str, page: u32, page_size: u32)
        -> Result<JobPage, JobError>;

    /// Lists jobs in `status` last updated before `older_than`, oldest first.
    fn list_by_status(
        &self,
        status: JobStatus,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Job>, JobError>;

    /// Removes a job record.
    fn delete(&self, id: &str) -> Result<(), JobError>;
}

/// Normalises a 1-based page request into `(page, page_size, offset)`.
pub(crate) fn page_bounds(page: u32, page_size: u32) -> (u32, u32, i64) {
    let page = page.max(1);
    let page_size = match page_size {
        0 => DEFAULT_PAGE_SIZE,
        n => n.min(MAX_PAGE_SIZE),
    };
    let offset = (page as i64 - 1) * page_size as i64;
    (page, page_size, offset)
}
