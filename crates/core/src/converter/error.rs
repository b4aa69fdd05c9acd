//! Error types for the converter module.

use std::path::PathBuf;
use thiserror::Error;

use crate::job::Category;

/// Errors that can occur during conversion.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// The converter does not handle this source/target combination.
    #[error("unsupported {category} conversion: {source_format} to {target_format}")]
    UnsupportedPair {
        category: Category,
        source_format: String,
        target_format: String,
    },

    /// The request was routed to a converter of another category.
    #[error("{converter} handles {expected} files, not {actual}")]
    CategoryMismatch {
        converter: String,
        expected: Category,
        actual: Category,
    },

    /// The settings cannot be applied by this converter.
    #[error("invalid settings: {reason}")]
    InvalidSettings { reason: String },

    /// External tool binary not found.
    #[error("{tool} not found at path: {path}")]
    ToolNotFound { tool: String, path: PathBuf },

    /// Conversion process failed.
    #[error("conversion failed: {reason}")]
    ConversionFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// The tool exited successfully but left no output file.
    #[error("conversion produced no output at {path}")]
    OutputMissing { path: PathBuf },

    /// Conversion timed out.
    #[error("conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error during conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConverterError {
    /// Creates a new conversion failed error with stderr output.
    pub fn conversion_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ConversionFailed {
            reason: reason.into(),
            stderr,
        }
    }

    pub fn invalid_settings(reason: impl Into<String>) -> Self {
        Self::InvalidSettings {
            reason: reason.into(),
        }
    }

    pub fn unsupported_pair(category: Category, source: &str, target: &str) -> Self {
        Self::UnsupportedPair {
            category,
            source_format: source.to_string(),
            target_format: target.to_string(),
        }
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ConverterError::unsupported_pair(Category::Video, "mp4", "xyz");
        assert_eq!(err.to_string(), "unsupported video conversion: mp4 to xyz");

        let err = ConverterError::Timeout { timeout_secs: 30 };
        assert_eq!(err.to_string(), "conversion timed out after 30 seconds");
        assert!(err.is_retryable());
        assert!(!ConverterError::invalid_settings("x").is_retryable());
    }
}
