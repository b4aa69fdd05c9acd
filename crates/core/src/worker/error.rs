//! Error types for job processing.

use thiserror::Error;

use crate::converter::ConverterError;
use crate::job::{Category, JobError};
use crate::storage::StorageError;

/// Why a job failed. The `Display` text becomes the job's error message.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("unsupported file category for format '{format}'")]
    Category { format: String },

    #[error("no converter registered for category {0}")]
    NoConverter(Category),

    #[error("{context}: {error}")]
    Storage {
        context: &'static str,
        #[source]
        error: StorageError,
    },

    #[error("conversion failed: {0}")]
    Conversion(#[from] ConverterError),

    #[error("job store error: {0}")]
    Store(#[from] JobError),

    #[error("failed to prepare working directory: {0}")]
    WorkDir(#[source] std::io::Error),
}

impl WorkerError {
    pub(crate) fn download(error: StorageError) -> Self {
        Self::Storage {
            context: "failed to download source file",
            error,
        }
    }

    pub(crate) fn upload(error: StorageError) -> Self {
        Self::Storage {
            context: "failed to store converted file",
            error,
        }
    }
}
