//! Worker configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent processing loops.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Scratch space; every job gets its own subdirectory.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// How long one dequeue call blocks (milliseconds).
    /// Shutdown is noticed between calls.
    #[serde(default = "default_dequeue_timeout")]
    pub dequeue_timeout_ms: u64,

    /// Upper bound on a single converter call (0 = unbounded).
    #[serde(default = "default_conversion_timeout")]
    pub conversion_timeout_secs: u64,

    /// Jobs left in `processing` longer than this are marked failed.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,

    /// How often the recovery sweep runs after startup (0 = startup only).
    #[serde(default = "default_recovery_interval")]
    pub recovery_interval_secs: u64,

    /// How often the cleaner runs (0 = never).
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Entries in `temp_dir` older than this are removed by the cleaner
    /// (0 = keep).
    #[serde(default = "default_temp_max_age")]
    pub temp_max_age_secs: u64,

    /// Finished jobs older than this are deleted with their files.
    /// Unset keeps them forever.
    #[serde(default)]
    pub retention_hours: Option<u64>,
}

fn default_concurrency() -> usize {
    2
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("./data/tmp")
}

fn default_dequeue_timeout() -> u64 {
    5000 // 5 seconds
}

fn default_conversion_timeout() -> u64 {
    1800 // 30 minutes
}

fn default_stale_after() -> u64 {
    3600 // 1 hour
}

fn default_recovery_interval() -> u64 {
    300
}

fn default_cleanup_interval() -> u64 {
    3600
}

fn default_temp_max_age() -> u64 {
    86400 // 24 hours
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            temp_dir: default_temp_dir(),
            dequeue_timeout_ms: default_dequeue_timeout(),
            conversion_timeout_secs: default_conversion_timeout(),
            stale_after_secs: default_stale_after(),
            recovery_interval_secs: default_recovery_interval(),
            cleanup_interval_secs: default_cleanup_interval(),
            temp_max_age_secs: default_temp_max_age(),
            retention_hours: None,
        }
    }
}

impl WorkerConfig {
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_dequeue_timeout_ms(mut self, ms: u64) -> Self {
        self.dequeue_timeout_ms = ms;
        self
    }

    pub fn with_conversion_timeout_secs(mut self, secs: u64) -> Self {
        self.conversion_timeout_secs = secs;
        self
    }

    pub fn with_stale_after_secs(mut self, secs: u64) -> Self {
        self.stale_after_secs = secs;
        self
    }
}
