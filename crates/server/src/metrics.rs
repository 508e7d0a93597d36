//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the MorphFlux server:
//! - HTTP request metrics (latency, counts)
//! - Transformations and processors by status (collected dynamically)

use morphflux_core::{JobFilter, JobStatus};
use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "morphflux_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("morphflux_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "morphflux_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Transformation Metrics (collected dynamically)
// =============================================================================

/// Persisted transformations by status.
pub static TRANSFORMATIONS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "morphflux_transformations_by_status",
            "Current transformation count by status",
        ),
        &["status"],
    )
    .unwrap()
});

/// Orchestrator accepting state (1 = accepting, 0 = shutting down).
pub static ORCHESTRATOR_ACCEPTING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "morphflux_orchestrator_accepting",
        "Whether the orchestrator accepts submissions (1) or not (0)",
    )
    .unwrap()
});

/// Idle workers in the pool.
pub static WORKERS_AVAILABLE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "morphflux_workers_available",
        "Number of workers not running a job",
    )
    .unwrap()
});

/// Processors by readiness status.
pub static PROCESSORS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "morphflux_processors_by_status",
            "Processor count by readiness status",
        ),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Dynamic
    registry
        .register(Box::new(TRANSFORMATIONS_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(ORCHESTRATOR_ACCEPTING.clone()))
        .unwrap();
    registry
        .register(Box::new(WORKERS_AVAILABLE.clone()))
        .unwrap();
    registry
        .register(Box::new(PROCESSORS_BY_STATUS.clone()))
        .unwrap();

    // Core metrics (orchestrator, model manager)
    for metric in morphflux_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the gauges reflect the store and model manager.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let orchestrator = state.orchestrator();
    let status = orchestrator.status();
    ORCHESTRATOR_ACCEPTING.set(if status.accepting { 1 } else { 0 });
    WORKERS_AVAILABLE.set(status.available_workers as i64);

    for job_status in [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ] {
        let filter = JobFilter::new().with_status(job_status);
        if let Ok(count) = orchestrator.count(&filter) {
            TRANSFORMATIONS_BY_STATUS
                .with_label_values(&[job_status.as_str()])
                .set(count);
        }
    }

    PROCESSORS_BY_STATUS.reset();
    for descriptor in state.models().descriptors() {
        PROCESSORS_BY_STATUS
            .with_label_values(&[descriptor.status.as_str()])
            .inc();
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    static UUID: Lazy<regex_lite::Regex> = Lazy::new(|| {
        regex_lite::Regex::new(
            r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
        )
        .unwrap()
    });
    // Caller-chosen ids under /transformations/
    static TRANSFORMATION_ID: Lazy<regex_lite::Regex> =
        Lazy::new(|| regex_lite::Regex::new(r"(/transformations/)[^/{]+(/|$)").unwrap());
    static NUMERIC: Lazy<regex_lite::Regex> =
        Lazy::new(|| regex_lite::Regex::new(r"/\d+(/|$)").unwrap());

    let result = UUID.replace_all(path, "{id}");
    let result = if result.ends_with("/transformations/process") {
        result
    } else {
        TRANSFORMATION_ID.replace_all(&result, "${1}{id}${2}").into_owned().into()
    };
    let result = NUMERIC.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/transformations/550e8400-e29b-41d4-a716-446655440000/status";
        assert_eq!(normalize_path(path), "/api/v1/transformations/{id}/status");
    }

    #[test]
    fn test_normalize_path_custom_id() {
        let path = "/api/v1/transformations/job-abc/result";
        assert_eq!(normalize_path(path), "/api/v1/transformations/{id}/result");
    }

    #[test]
    fn test_normalize_path_process_route() {
        let path = "/api/v1/transformations/process";
        assert_eq!(normalize_path(path), "/api/v1/transformations/process");
    }

    #[test]
    fn test_normalize_path_numeric() {
        let path = "/api/v1/models/12345";
        assert_eq!(normalize_path(path), "/api/v1/models/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        let path = "/api/v1/health";
        assert_eq!(normalize_path(path), "/api/v1/health");
        assert_eq!(normalize_path("/api/v1/transformations"), "/api/v1/transformations");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("morphflux_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_all_metrics() {
        // Prometheus only outputs labelled metrics that have been touched
        HTTP_REQUEST_DURATION
            .with_label_values(&["GET", "/test", "200"])
            .observe(0.1);
        HTTP_REQUESTS_IN_FLIGHT.set(0);
        TRANSFORMATIONS_BY_STATUS
            .with_label_values(&["pending"])
            .set(0);
        ORCHESTRATOR_ACCEPTING.set(1);
        morphflux_core::metrics::JOBS_SUBMITTED
            .with_label_values(&["style_transfer"])
            .inc();

        let output = encode_metrics();

        assert!(output.contains("morphflux_http_request_duration_seconds"));
        assert!(output.contains("morphflux_http_requests_in_flight"));
        assert!(output.contains("morphflux_transformations_by_status"));
        assert!(output.contains("morphflux_orchestrator_accepting"));
        assert!(output.contains("morphflux_jobs_submitted_total"));
        assert!(output.contains("morphflux_processors_ready"));
    }
}
