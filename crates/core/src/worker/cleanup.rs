//! Periodic removal of stale scratch files and expired jobs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use tracing::{debug, warn};

use crate::job::{Job, JobStatus, JobStore};
use crate::metrics;
use crate::storage::{StorageBackend, StorageError};

use super::config::WorkerConfig;

/// Jobs fetched per retention batch.
const RETENTION_BATCH: usize = 100;

/// What one cleanup pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Files or directories removed from the temp dir.
    pub temp_entries: usize,
    /// Expired job records deleted.
    pub jobs: usize,
    /// Source and output objects deleted from storage.
    pub objects: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.temp_entries + self.jobs + self.objects
    }
}

/// Removes leftovers the worker cannot clean up inline: working
/// directories of crashed runs, and finished jobs past their retention.
pub struct Cleaner {
    store: Arc<dyn JobStore>,
    storage: Arc<dyn StorageBackend>,
    temp_dir: PathBuf,
    temp_max_age: Option<Duration>,
    retention: Option<chrono::Duration>,
}

impl Cleaner {
    pub fn new(
        store: Arc<dyn JobStore>,
        storage: Arc<dyn StorageBackend>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            store,
            storage,
            temp_dir: config.temp_dir.clone(),
            temp_max_age: (config.temp_max_age_secs > 0)
                .then(|| Duration::from_secs(config.temp_max_age_secs)),
            retention: config
                .retention_hours
                .map(|hours| chrono::Duration::hours(hours as i64)),
        }
    }

    /// Runs one pass. Failures are logged and skipped.
    pub async fn run_once(&self) -> CleanupReport {
        let mut report = CleanupReport::default();
        if let Some(max_age) = self.temp_max_age {
            report.temp_entries = self.clean_temp(max_age).await;
        }
        if let Some(retention) = self.retention {
            let (jobs, objects) = self.clean_expired(retention).await;
            report.jobs = jobs;
            report.objects = objects;
        }
        report
    }

    async fn clean_temp(&self, max_age: Duration) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.temp_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to read temp dir {}: {}", self.temp_dir.display(), e);
                }
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to list temp dir: {}", e);
                    break;
                }
            };
            let path = entry.path();
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                Err(_) => continue,
            };
            let age = meta
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }

            let result = if meta.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            match result {
                Ok(()) => {
                    debug!("Removed stale temp entry {}", path.display());
                    removed += 1;
                    metrics::FILES_CLEANED_TOTAL
                        .with_label_values(&["temp"])
                        .inc();
                }
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        removed
    }

    async fn clean_expired(&self, retention: chrono::Duration) -> (usize, usize) {
        let cutoff = Utc::now() - retention;
        let mut jobs = 0;
        let mut objects = 0;

        for status in [JobStatus::Completed, JobStatus::Failed] {
            loop {
                let expired = match self.store.list_by_status(status, cutoff, RETENTION_BATCH) {
                    Ok(expired) => expired,
                    Err(e) => {
                        warn!("Failed to list expired {} jobs: {}", status, e);
                        break;
                    }
                };
                let batch = expired.len();
                let mut deleted_in_batch = 0;

                for job in expired {
                    objects += self.delete_objects(&job).await;
                    match self.store.delete(&job.id) {
                        Ok(()) => {
                            debug!("Deleted expired job {}", job.id);
                            deleted_in_batch += 1;
                            metrics::FILES_CLEANED_TOTAL
                                .with_label_values(&["expired_job"])
                                .inc();
                        }
                        Err(e) => warn!("Failed to delete expired job {}: {}", job.id, e),
                    }
                }
                jobs += deleted_in_batch;

                // A short batch is the last one; a batch with no progress
                // would be returned again.
                if batch < RETENTION_BATCH || deleted_in_batch == 0 {
                    break;
                }
            }
        }

        (jobs, objects)
    }

    async fn delete_objects(&self, job: &Job) -> usize {
        let mut deleted = 0;
        let locations = std::iter::once(job.source_location.as_str())
            .chain(job.output_location.as_deref());
        for location in locations {
            match self.storage.delete(location).await {
                Ok(()) => deleted += 1,
                Err(StorageError::NotFound(_)) => {}
                Err(e) => warn!("Failed to delete {} for job {}: {}", location, job.id, e),
            }
        }
        deleted
    }
}
