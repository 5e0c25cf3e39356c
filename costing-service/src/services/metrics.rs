//! Prometheus metrics for costing-service.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

/// Recorder for the HTTP metrics emitted by `service_core` middleware.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Backend call counter by operation and outcome.
pub static BACKEND_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "costing_backend_requests_total",
        "Total number of project costs backend requests",
        &["operation", "status"] // fetch|save, success|error
    )
    .expect("Failed to register backend_requests_total")
});

/// Backend call duration histogram by operation.
pub static BACKEND_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "costing_backend_request_duration_seconds",
        "Project costs backend request duration in seconds",
        &["operation"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register backend_request_duration")
});

/// Bulk adjustment counter by scope.
pub static ADJUSTMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "costing_adjustments_total",
        "Total number of bulk price adjustments by scope",
        &["scope"]
    )
    .expect("Failed to register adjustments_total")
});

/// Save counter by outcome.
pub static SAVES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "costing_saves_total",
        "Total number of review saves by outcome",
        &["outcome"] // saved, invalid, failed
    )
    .expect("Failed to register saves_total")
});

/// Field validation failures, counted per offending field.
pub static VALIDATION_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "costing_validation_failures_total",
        "Total number of form fields rejected on save",
        &["kind"] // required, invalid
    )
    .expect("Failed to register validation_failures_total")
});

/// Initialize all metrics and install the HTTP metrics recorder.
///
/// Safe to call more than once; only the first call installs the recorder.
pub fn init_metrics() {
    Lazy::force(&BACKEND_REQUESTS_TOTAL);
    Lazy::force(&BACKEND_REQUEST_DURATION);
    Lazy::force(&ADJUSTMENTS_TOTAL);
    Lazy::force(&SAVES_TOTAL);
    Lazy::force(&VALIDATION_FAILURES_TOTAL);

    if METRICS_HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => tracing::warn!(error = %e, "HTTP metrics recorder not installed"),
    }
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    if let Ok(custom_metrics) = encoder.encode_to_string(&metric_families) {
        output.push_str(&custom_metrics);
    }

    output
}

pub fn record_backend_request(operation: &str, success: bool, duration_secs: f64) {
    let status = if success { "success" } else { "error" };
    BACKEND_REQUESTS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
    BACKEND_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
}

pub fn record_adjustment(scope: &str) {
    ADJUSTMENTS_TOTAL.with_label_values(&[scope]).inc();
}

pub fn record_save(outcome: &str) {
    SAVES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_validation_failure(kind: &str) {
    VALIDATION_FAILURES_TOTAL.with_label_values(&[kind]).inc();
}
