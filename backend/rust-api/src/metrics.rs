use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Fan-out Metrics
    pub static ref TRIGGERS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "notification_triggers_total",
        "Total number of handled document triggers",
        &["category", "outcome"]
    )
    .unwrap();

    pub static ref TRIGGER_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "notification_trigger_duration_seconds",
        "Time from trigger receipt to handler completion",
        &["category"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap();

    pub static ref PUSH_DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "push_deliveries_total",
        "Push tokens accepted or rejected by the transport",
        &["category", "result"]
    )
    .unwrap();

    // Admin Metrics
    pub static ref ACCOUNT_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "account_operations_total",
        "Total number of account administration operations",
        &["operation", "status"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}
