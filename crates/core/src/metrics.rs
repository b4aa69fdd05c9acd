//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Job submission
//! - Worker processing (outcomes, durations, recovery)
//! - Queue polling

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Jobs
// =============================================================================

/// Jobs accepted and enqueued.
pub static JOBS_SUBMITTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("transmute_jobs_submitted_total", "Total jobs submitted").unwrap()
});

/// Jobs processed by workers, by category and outcome.
pub static JOBS_PROCESSED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("transmute_jobs_processed_total", "Total jobs processed"),
        &["category", "outcome"], // outcome: "completed", "failed"
    )
    .unwrap()
});

/// End-to-end processing time per job.
pub static JOB_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "transmute_job_duration_seconds",
            "Duration of job processing from dequeue to final status",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]),
        &["category"],
    )
    .unwrap()
});

/// Stale processing jobs marked failed by the recovery sweep.
pub static JOBS_RECOVERED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "transmute_jobs_recovered_total",
        "Total interrupted jobs marked failed by recovery",
    )
    .unwrap()
});

// =============================================================================
// Workers
// =============================================================================

/// Jobs currently being processed.
pub static JOBS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("transmute_jobs_in_flight", "Jobs currently being processed").unwrap()
});

/// Dequeue calls that timed out with nothing to do.
pub static QUEUE_EMPTY_POLLS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "transmute_queue_empty_polls_total",
        "Total dequeue attempts that returned no job",
    )
    .unwrap()
});

/// Files removed by the cleanup task, by kind.
pub static FILES_CLEANED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("transmute_files_cleaned_total", "Total files removed by cleanup"),
        &["kind"], // "temp", "expired_job"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_SUBMITTED_TOTAL.clone()),
        Box::new(JOBS_PROCESSED_TOTAL.clone()),
        Box::new(JOB_DURATION_SECONDS.clone()),
        Box::new(JOBS_RECOVERED_TOTAL.clone()),
        Box::new(JOBS_IN_FLIGHT.clone()),
        Box::new(QUEUE_EMPTY_POLLS_TOTAL.clone()),
        Box::new(FILES_CLEANED_TOTAL.clone()),
    ]
}
