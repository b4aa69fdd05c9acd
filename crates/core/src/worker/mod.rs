//! Worker: the consuming side of the job pipeline.
//!
//! [`Worker`] runs a pool of loops that dequeue [`JobTask`](crate::job::JobTask)s
//! and drive each job to `completed` or `failed`. On startup, and
//! periodically afterwards, a recovery sweep fails jobs that were left in
//! `processing` by a crashed worker. [`Cleaner`] removes stale scratch
//! files and, when retention is configured, expired jobs with their files.

mod cleanup;
mod config;
mod error;
mod runner;
mod types;

pub use cleanup::{CleanupReport, Cleaner};
pub use config::WorkerConfig;
pub use error::WorkerError;
pub use runner::{Worker, INTERRUPTED_MESSAGE};
pub use types::{ProcessOutcome, WorkerStatus};
