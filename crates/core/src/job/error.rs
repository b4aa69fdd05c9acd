//! Error types for the job module.

use thiserror::Error;

use super::category::Category;
use super::types::JobStatus;
use crate::queue::QueueError;
use crate::storage::StorageError;

/// A request rejected before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required request field is empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A format token is not a plain extension.
    #[error("invalid format token: '{0}'")]
    InvalidFormat(String),

    /// A setting has an out-of-range or unparseable value.
    #[error("invalid value for setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    /// A setting key is not recognised for the category.
    #[error("unknown setting '{key}' for {category} conversions")]
    UnknownSetting { key: String, category: Category },

    /// The settings variant does not belong to the job's category.
    #[error("{kind} settings cannot be used for {category} conversions")]
    SettingsMismatch { kind: String, category: Category },
}

impl ValidationError {
    pub fn invalid_setting(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from the job store and job service.
#[derive(Debug, Error)]
pub enum JobError {
    /// No job with this id (or not owned by the caller).
    #[error("Job not found: {0}")]
    NotFound(String),

    /// A status change that does not follow the job lifecycle.
    #[error("Cannot move job {job_id} from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The task could not be handed to the queue.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<rusqlite::Error> for JobError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<serde_json::Error> for JobError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
