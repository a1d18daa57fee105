//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Jobs (results and duration per backend)
//! - Process supervision (spawns, forced terminations)
//! - Temp files and exit classification

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Jobs
// =============================================================================

/// Conversion jobs by backend and result.
pub static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("convertino_jobs_total", "Total conversion jobs"),
        &["backend", "result"], // "succeeded", "failed", "cancelled"
    )
    .unwrap()
});

/// Job duration in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "convertino_job_duration_seconds",
            "Duration of a single conversion job",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0]),
        &["backend"],
    )
    .unwrap()
});

// =============================================================================
// Processes
// =============================================================================

/// External processes spawned by tool.
pub static PROCESSES_SPAWNED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "convertino_processes_spawned_total",
            "Total external tool processes spawned",
        ),
        &["tool"],
    )
    .unwrap()
});

/// Escalations past SIGINT, by the signal that was needed.
pub static FORCED_TERMINATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "convertino_forced_terminations_total",
            "Processes that ignored SIGINT within the grace period",
        ),
        &["signal"], // "SIGTERM", "SIGKILL"
    )
    .unwrap()
});

// =============================================================================
// Temp files & classification
// =============================================================================

pub static TEMP_PATHS_REMOVED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "convertino_temp_paths_removed_total",
        "Tracked temp paths removed by cleanup sweeps",
    )
    .unwrap()
});

/// Non-zero exits accepted through the benign-exit allow-list.
pub static CLASSIFICATION_DOWNGRADES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "convertino_classification_downgrades_total",
            "Non-zero tool exits treated as success",
        ),
        &["tool"],
    )
    .unwrap()
});

/// Get all metrics for registration with a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_TOTAL.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(PROCESSES_SPAWNED.clone()),
        Box::new(FORCED_TERMINATIONS.clone()),
        Box::new(TEMP_PATHS_REMOVED.clone()),
        Box::new(CLASSIFICATION_DOWNGRADES.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        JOBS_TOTAL.with_label_values(&["image", "succeeded"]).inc();
        assert!(registry
            .gather()
            .iter()
            .any(|f| f.get_name() == "convertino_jobs_total"));
    }
}
