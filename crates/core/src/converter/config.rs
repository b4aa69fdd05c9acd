//! Configuration for the converter module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Paths to the external tools the converters shell out to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Path to ffmpeg binary (audio and video).
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to the ImageMagick binary (images).
    #[serde(default = "default_imagemagick_path")]
    pub imagemagick_path: PathBuf,

    /// Path to LibreOffice (documents).
    #[serde(default = "default_libreoffice_path")]
    pub libreoffice_path: PathBuf,

    #[serde(default = "default_sevenzip_path")]
    pub sevenzip_path: PathBuf,

    #[serde(default = "default_tar_path")]
    pub tar_path: PathBuf,

    #[serde(default = "default_zip_path")]
    pub zip_path: PathBuf,

    #[serde(default = "default_unzip_path")]
    pub unzip_path: PathBuf,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_imagemagick_path() -> PathBuf {
    PathBuf::from("magick")
}

fn default_libreoffice_path() -> PathBuf {
    PathBuf::from("soffice")
}

fn default_sevenzip_path() -> PathBuf {
    PathBuf::from("7z")
}

fn default_tar_path() -> PathBuf {
    PathBuf::from("tar")
}

fn default_zip_path() -> PathBuf {
    PathBuf::from("zip")
}

fn default_unzip_path() -> PathBuf {
    PathBuf::from("unzip")
}

fn default_log_level() -> String {
    "error".to_string()
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            imagemagick_path: default_imagemagick_path(),
            libreoffice_path: default_libreoffice_path(),
            sevenzip_path: default_sevenzip_path(),
            tar_path: default_tar_path(),
            zip_path: default_zip_path(),
            unzip_path: default_unzip_path(),
            ffmpeg_log_level: default_log_level(),
        }
    }
}

impl ConverterConfig {
    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    pub fn with_imagemagick_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.imagemagick_path = path.into();
        self
    }

    pub fn with_libreoffice_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.libreoffice_path = path.into();
        self
    }
}
