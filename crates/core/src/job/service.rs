//! Submission and polling facade over the job store and queue.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::category::Category;
use super::error::{JobError, ValidationError};
use super::settings::ConversionSettings;
use super::store::JobStore;
use super::types::{Job, JobPage, JobStatus, NewJob};
use crate::metrics;
use crate::queue::JobQueue;
use crate::storage::StorageBackend;

static FORMAT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]{1,10}(\.[a-z0-9]{1,10})?$").unwrap());

/// Settings as supplied by the submitter.
#[derive(Debug, Clone, Default)]
pub enum SettingsInput {
    /// Use the category's defaults.
    #[default]
    None,
    /// Already typed; checked against the category.
    Typed(ConversionSettings),
    /// Flat key/value map; parsed with [`ConversionSettings::from_raw`].
    Raw(Map<String, Value>),
}

/// A request to convert an already-stored file.
#[derive(Debug, Clone)]
pub struct CreateJobRequest {
    pub owner_id: String,
    /// Location returned by the storage backend for the uploaded bytes.
    pub source_location: String,
    pub source_format: String,
    pub target_format: String,
    pub original_filename: Option<String>,
    pub file_size: u64,
    pub settings: SettingsInput,
}

impl CreateJobRequest {
    pub fn new(
        owner_id: impl Into<String>,
        source_location: impl Into<String>,
        source_format: impl Into<String>,
        target_format: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            source_location: source_location.into(),
            source_format: source_format.into(),
            target_format: target_format.into(),
            original_filename: None,
            file_size: 0,
            settings: SettingsInput::None,
        }
    }

    pub fn with_original_filename(mut self, name: impl Into<String>) -> Self {
        self.original_filename = Some(name.into());
        self
    }

    pub fn with_file_size(mut self, size: u64) -> Self {
        self.file_size = size;
        self
    }

    pub fn with_settings(mut self, settings: ConversionSettings) -> Self {
        self.settings = SettingsInput::Typed(settings);
        self
    }

    pub fn with_raw_settings(mut self, raw: Map<String, Value>) -> Self {
        self.settings = SettingsInput::Raw(raw);
        self
    }
}

/// Normalises a format token: trimmed, leading dot removed, lower-cased.
pub fn normalize_format(token: &str) -> Result<String, ValidationError> {
    let normalized = token.trim().trim_start_matches('.').to_ascii_lowercase();
    if FORMAT_TOKEN.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(ValidationError::InvalidFormat(token.to_string()))
    }
}

/// Front door for clients: creates jobs and reads them back.
pub struct JobService {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn JobQueue>,
    storage: Arc<dyn StorageBackend>,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn JobQueue>,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            store,
            queue,
            storage,
        }
    }

    /// Checks a request and produces the record to insert. Touches nothing.
    pub fn validate(request: CreateJobRequest) -> Result<NewJob, ValidationError> {
        if request.owner_id.trim().is_empty() {
            return Err(ValidationError::MissingField("owner_id"));
        }
        if request.source_location.trim().is_empty() {
            return Err(ValidationError::MissingField("source_location"));
        }
        let source_format = normalize_format(&request.source_format)?;
        let target_format = normalize_format(&request.target_format)?;
        let category = Category::from_format(&source_format);

        let settings = match request.settings {
            SettingsInput::None => ConversionSettings::from_raw(category, &Map::new())?,
            SettingsInput::Typed(settings) => {
                settings.validate(category)?;
                settings
            }
            SettingsInput::Raw(raw) => ConversionSettings::from_raw(category, &raw)?,
        };

        Ok(NewJob {
            owner_id: request.owner_id,
            source_location: request.source_location,
            source_format,
            target_format,
            original_filename: request.original_filename,
            file_size: request.file_size,
            settings,
        })
    }

    /// Creates a `pending` job and enqueues its task.
    ///
    /// Either both happen or neither is visible: if the enqueue fails the
    /// record is removed again (or, failing that, marked failed).
    pub async fn create(&self, request: CreateJobRequest) -> Result<Job, JobError> {
        let new_job = Self::validate(request)?;
        let job = self.store.create(new_job)?;

        if let Err(e) = self.queue.enqueue(job.to_task()).await {
            warn!("Failed to enqueue job {}: {}", job.id, e);
            if let Err(delete_err) = self.store.delete(&job.id) {
                error!(
                    "Failed to remove unqueued job {}: {}; marking it failed",
                    job.id, delete_err
                );
                let message = format!("failed to enqueue job: {}", e);
                if let Err(update_err) =
                    self.store
                        .update_status(&job.id, JobStatus::Failed, None, Some(&message))
                {
                    error!("Failed to mark job {} failed: {}", job.id, update_err);
                }
            }
            return Err(JobError::Queue(e));
        }

        metrics::JOBS_SUBMITTED_TOTAL.inc();
        info!(
            "Created job {} ({} -> {}) for {}",
            job.id, job.source_format, job.target_format, job.owner_id
        );
        Ok(job)
    }

    pub fn get(&self, id: &str, owner_id: &str) -> Result<Job, JobError> {
        self.store.get(id, owner_id)
    }

    pub fn list_by_owner(
        &self,
        owner_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<JobPage, JobError> {
        self.store.list_by_owner(owner_id, page, page_size)
    }

    /// Moves a job along its lifecycle, rejecting out-of-order transitions.
    ///
    /// `completed` requires an output location and `failed` an error
    /// message; both must be non-blank.
    pub fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        output_location: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<Job, JobError> {
        let present = |value: Option<&str>| value.is_some_and(|v| !v.trim().is_empty());
        match status {
            JobStatus::Completed if !present(output_location) => {
                return Err(ValidationError::MissingField("output_location").into());
            }
            JobStatus::Failed if !present(error_message) => {
                return Err(ValidationError::MissingField("error_message").into());
            }
            _ => {}
        }

        let current = self.store.get_any(id)?;
        if !current.status.can_transition_to(status) {
            return Err(JobError::InvalidTransition {
                job_id: id.to_string(),
                from: current.status,
                to: status,
            });
        }
        self.store
            .update_status(id, status, output_location, error_message)
    }

    /// Returns a time-limited download URL for a completed job's output.
    ///
    /// `None` when the job is not completed or the backend cannot presign.
    pub async fn delivery_url(
        &self,
        id: &str,
        owner_id: &str,
        ttl: Duration,
    ) -> Result<Option<String>, JobError> {
        let job = self.store.get(id, owner_id)?;
        let Some(location) = job.output_location.filter(|_| job.status == JobStatus::Completed)
        else {
            return Ok(None);
        };
        Ok(self.storage.presigned_url(&location, ttl).await?)
    }
}
