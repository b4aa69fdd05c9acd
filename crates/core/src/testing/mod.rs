//! Testing utilities and mock implementations.
//!
//! Lets the worker pipeline run end to end without the external
//! conversion tools installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use transmute_core::testing::{MockConverter, RecordingStorage};
//!
//! let converter = Arc::new(MockConverter::new(Category::Image));
//! let storage = Arc::new(RecordingStorage::new(local_storage));
//!
//! // ... run the worker ...
//! assert_eq!(storage.get_count(), 0);
//! ```

mod mock_converter;
mod recording_storage;

pub use mock_converter::{MockConverter, RecordedConversion};
pub use recording_storage::RecordingStorage;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::job::{CreateJobRequest, JobTask};
    use crate::storage::{StorageBackend, StorageError};
    use chrono::Utc;

    /// Stores `bytes` and returns the location.
    pub async fn upload(
        storage: &dyn StorageBackend,
        name: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let reader = std::io::Cursor::new(bytes.to_vec());
        storage.put(Box::new(reader), name, bytes.len() as u64).await
    }

    /// A create request with reasonable defaults.
    pub fn job_request(source_location: &str, source: &str, target: &str) -> CreateJobRequest {
        CreateJobRequest::new("user-1", source_location, source, target)
            .with_original_filename(format!("upload.{}", source))
            .with_file_size(1024)
    }

    /// A queue payload that was never stored as a job.
    pub fn task(job_id: &str, source_location: &str, source: &str, target: &str) -> JobTask {
        JobTask {
            job_id: job_id.to_string(),
            owner_id: "user-1".to_string(),
            source_location: source_location.to_string(),
            output_hint: None,
            source_format: source.to_string(),
            target_format: target.to_string(),
            settings: Default::default(),
            created_at: Utc::now(),
        }
    }
}
