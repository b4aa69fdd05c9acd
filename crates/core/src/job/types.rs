//! Types for the job module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::settings::ConversionSettings;

/// Lifecycle state of a conversion job.
///
/// Jobs move `pending -> processing -> {completed, failed}` and never leave
/// a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created and enqueued, not yet picked up by a worker.
    Pending,
    /// Claimed by a worker.
    Processing,
    /// Converted successfully; the output location is set.
    Completed,
    /// Terminal failure; the error message is set.
    Failed,
}

impl JobStatus {
    /// Returns the string stored in the database for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether this status is terminal (completed or failed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving from this status to `next` follows the lifecycle.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// A durable record of one requested file conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// External handle (UUID v4).
    pub id: String,
    /// Identifier of the submitting principal.
    pub owner_id: String,
    /// Storage location of the uploaded bytes.
    pub source_location: String,
    /// Storage location of the converted bytes (set only once completed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_location: Option<String>,
    /// Lower-cased source format token (e.g. `jpeg`).
    pub source_format: String,
    /// Lower-cased target format token (e.g. `png`).
    pub target_format: String,
    /// Name of the file as uploaded, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    /// Size of the uploaded file in bytes.
    pub file_size: u64,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Human-readable failure cause (set only once failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Conversion parameters, validated at creation.
    pub settings: ConversionSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set exactly when the job reaches a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Builds the queue payload for this job.
    pub fn to_task(&self) -> JobTask {
        JobTask {
            job_id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            source_location: self.source_location.clone(),
            output_hint: None,
            source_format: self.source_format.clone(),
            target_format: self.target_format.clone(),
            settings: self.settings.clone(),
            created_at: self.created_at,
        }
    }
}

/// Queue payload: the part of a [`Job`] a worker needs to process it
/// without re-reading the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTask {
    pub job_id: String,
    pub owner_id: String,
    pub source_location: String,
    /// Suggested name for the output object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_hint: Option<String>,
    pub source_format: String,
    pub target_format: String,
    #[serde(default)]
    pub settings: ConversionSettings,
    pub created_at: DateTime<Utc>,
}

impl JobTask {
    /// Name suggested to the storage backend for the converted output.
    pub fn output_name(&self) -> String {
        self.output_hint
            .clone()
            .unwrap_or_else(|| format!("{}.{}", self.job_id, self.target_format))
    }
}

/// Data needed to insert a new job record.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub owner_id: String,
    pub source_location: String,
    pub source_format: String,
    pub target_format: String,
    pub original_filename: Option<String>,
    pub file_size: u64,
    pub settings: ConversionSettings,
}

/// One page of an owner's jobs.
#[derive(Debug, Clone, Serialize)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    /// Total number of jobs for the owner across all pages.
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_str() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("done".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_status_transitions() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));

        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Pending));
    }

    #[test]
    fn test_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_task_output_name() {
        let task = JobTask {
            job_id: "abc".to_string(),
            owner_id: "user-1".to_string(),
            source_location: "2024/01/01/photo_12345678.jpeg".to_string(),
            output_hint: None,
            source_format: "jpeg".to_string(),
            target_format: "png".to_string(),
            settings: ConversionSettings::Default,
            created_at: Utc::now(),
        };
        assert_eq!(task.output_name(), "abc.png");

        let hinted = JobTask {
            output_hint: Some("holiday.png".to_string()),
            ..task
        };
        assert_eq!(hinted.output_name(), "holiday.png");
    }

    #[test]
    fn test_task_json_shape() {
        let task = JobTask {
            job_id: "abc".to_string(),
            owner_id: "user-1".to_string(),
            source_location: "in.mp3".to_string(),
            output_hint: None,
            source_format: "mp3".to_string(),
            target_format: "wav".to_string(),
            settings: ConversionSettings::Default,
            created_at: Utc::now(),
        };
        let json: serde_json::Value = serde_json::to_value(&task).unwrap();
        assert_eq!(json["job_id"], "abc");
        assert_eq!(json["settings"]["kind"], "default");
        assert!(json.get("output_hint").is_none());
    }
}
