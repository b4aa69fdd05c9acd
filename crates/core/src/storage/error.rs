//! Error types for the storage module.

use thiserror::Error;

/// Errors from a [`StorageBackend`](super::StorageBackend).
#[derive(Debug, Error)]
pub enum StorageError {
    /// No object at this location.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The location resolves outside the storage root or the remote
    /// refused the credentials.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The stream length did not match the declared size. Nothing was stored.
    #[error("file size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    /// The location string is malformed.
    #[error("invalid storage location: {0}")]
    InvalidLocation(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote object store returned an error or could not be reached.
    #[error("object store error: {0}")]
    Remote(String),

    #[error("storage configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Whether retrying the same call might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Remote(_))
    }
}
