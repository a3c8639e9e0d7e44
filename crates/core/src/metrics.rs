//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Grid commands (attempts, durations)
//! - Transfer submission (jobs, files, flush outcomes, quota waits)
//! - Directory sync (per-file outcomes)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Command Metrics
// =============================================================================

/// Command attempts total by result.
pub static COMMAND_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gridsync_command_attempts_total",
            "Total grid command attempts",
        ),
        &["result"], // "success", "error", "timeout"
    )
    .unwrap()
});

/// Command attempt duration in seconds.
pub static COMMAND_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "gridsync_command_duration_seconds",
            "Duration of a single grid command attempt",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0, 7200.0]),
        &["program"],
    )
    .unwrap()
});

// =============================================================================
// Transfer Metrics
// =============================================================================

/// Bulk transfer jobs accepted by the service.
pub static TRANSFERS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "gridsync_transfers_submitted_total",
        "Total bulk transfer jobs submitted",
    )
    .unwrap()
});

/// File pairs included in submitted jobs.
pub static FILES_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "gridsync_files_submitted_total",
        "Total file pairs included in submitted jobs",
    )
    .unwrap()
});

/// Channel flushes by outcome.
pub static FLUSHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gridsync_flushes_total", "Total channel flushes"),
        &["outcome"], // "submitted", "discarded", "deferred", "failed"
    )
    .unwrap()
});

/// Polls that found a channel over its ceiling.
pub static QUOTA_WAITS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "gridsync_quota_waits_total",
        "Total waits for channel capacity",
    )
    .unwrap()
});

// =============================================================================
// Sync Metrics
// =============================================================================

/// Files processed by the sync driver, by outcome.
pub static SYNC_FILES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gridsync_sync_files_total", "Total files seen by directory syncs"),
        &["outcome"], // "queued", "replicated", "present", "filtered", "failed"
    )
    .unwrap()
});

/// All core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Commands
        Box::new(COMMAND_ATTEMPTS.clone()),
        Box::new(COMMAND_DURATION.clone()),
        // Transfers
        Box::new(TRANSFERS_SUBMITTED.clone()),
        Box::new(FILES_SUBMITTED.clone()),
        Box::new(FLUSHES.clone()),
        Box::new(QUOTA_WAITS.clone()),
        // Sync
        Box::new(SYNC_FILES.clone()),
    ]
}
