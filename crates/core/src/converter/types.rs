//! Types for the converter module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::job::ConversionSettings;

/// One conversion for a converter to perform.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Job this conversion belongs to (for logging).
    pub job_id: String,
    /// Local input file.
    pub input_path: PathBuf,
    /// Where the converter must write its output.
    pub output_path: PathBuf,
    pub source_format: String,
    pub target_format: String,
    pub settings: ConversionSettings,
}

/// Result of a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub output_path: PathBuf,
    pub size_bytes: u64,
    /// Wall-clock time spent converting.
    pub duration_ms: u64,
}

/// A source/target format combination a converter accepts.
pub type FormatPair = (&'static str, &'static str);

/// Folds format aliases into the token converters match on.
pub fn canonical_format(format: &str) -> String {
    let lower = format.trim().trim_start_matches('.').to_ascii_lowercase();
    match lower.as_str() {
        "jpg" => "jpeg".to_string(),
        "tgz" => "tar.gz".to_string(),
        _ => lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_format() {
        assert_eq!(canonical_format("JPG"), "jpeg");
        assert_eq!(canonical_format(".tgz"), "tar.gz");
        assert_eq!(canonical_format("png"), "png");
    }
}
