//! Types for the worker.

use serde::{Deserialize, Serialize};

/// What happened to one dequeued task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The job is completed; holds the output location.
    Completed(String),
    /// The job is failed; holds the recorded error message.
    Failed(String),
    /// The job record could not be moved forward and was left as is.
    Skipped,
}

/// Current status of the worker pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub running: bool,
    /// Configured number of loops.
    pub concurrency: usize,
    /// Jobs being processed right now.
    pub active_jobs: usize,
    pub total_completed: u64,
    pub total_failed: u64,
    /// Jobs marked failed by the recovery sweep.
    pub total_recovered: u64,
    /// Tasks waiting in the queue, if the queue could report it.
    pub queue_depth: Option<usize>,
}
