//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Orchestrator (submissions, outcomes, processing time)
//! - Model manager (processor readiness, load outcomes)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Orchestrator Metrics
// =============================================================================

/// Jobs accepted for processing, by transformation type.
pub static JOBS_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "morphflux_jobs_submitted_total",
            "Total transformation jobs accepted",
        ),
        &["transformation_type"],
    )
    .unwrap()
});

/// Jobs reaching a terminal state, by type and outcome.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "morphflux_jobs_finished_total",
            "Total transformation jobs that reached a terminal state",
        ),
        &["transformation_type", "outcome"], // "completed" or a failure kind
    )
    .unwrap()
});

/// Wall-clock processing time in seconds.
pub static PROCESSING_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "morphflux_processing_duration_seconds",
            "Duration from start of processing to terminal state",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["transformation_type"],
    )
    .unwrap()
});

/// Jobs currently executing or waiting for a worker.
pub static JOBS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "morphflux_jobs_in_flight",
        "Transformation jobs currently in flight",
    )
    .unwrap()
});

// =============================================================================
// Model Manager Metrics
// =============================================================================

/// Number of processors with status `ready`.
pub static PROCESSORS_READY: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("morphflux_processors_ready", "Processors ready for dispatch").unwrap()
});

/// Processor load attempts by result.
pub static PROCESSOR_LOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "morphflux_processor_loads_total",
            "Processor load attempts at startup",
        ),
        &["processor", "result"], // "ready", "failed"
    )
    .unwrap()
});

/// Returns all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(PROCESSING_DURATION.clone()),
        Box::new(JOBS_IN_FLIGHT.clone()),
        Box::new(PROCESSORS_READY.clone()),
        Box::new(PROCESSOR_LOADS.clone()),
    ]
}
