//! Routing classification derived from a source format token.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Converter family a job is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Document,
    Image,
    Video,
    Audio,
    Archive,
    /// No converter family handles this format.
    Unknown,
}

const DOCUMENT_FORMATS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "rtf", "csv",
];
const IMAGE_FORMATS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "svg", "heic",
];
const VIDEO_FORMATS: &[&str] = &["mp4", "avi", "mov", "wmv", "flv", "mkv", "webm", "m4v"];
const AUDIO_FORMATS: &[&str] = &["mp3", "wav", "flac", "aac", "ogg", "m4a", "wma"];
const ARCHIVE_FORMATS: &[&str] = &[
    "zip", "rar", "7z", "tar", "gz", "bz2", "xz", "tar.gz", "tgz",
];

impl Category {
    /// Classifies a format token. Total and case-insensitive; a leading dot
    /// is ignored.
    pub fn from_format(format: &str) -> Self {
        let normalized = format.trim().trim_start_matches('.').to_ascii_lowercase();
        let f = normalized.as_str();

        if DOCUMENT_FORMATS.contains(&f) {
            Self::Document
        } else if IMAGE_FORMATS.contains(&f) {
            Self::Image
        } else if VIDEO_FORMATS.contains(&f) {
            Self::Video
        } else if AUDIO_FORMATS.contains(&f) {
            Self::Audio
        } else if ARCHIVE_FORMATS.contains(&f) {
            Self::Archive
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Archive => "archive",
            Self::Unknown => "unknown",
        }
    }

    /// Every routable category (excludes `Unknown`).
    pub fn known() -> [Category; 5] {
        [
            Self::Document,
            Self::Image,
            Self::Video,
            Self::Audio,
            Self::Archive,
        ]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
