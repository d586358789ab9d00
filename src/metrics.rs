//! Prometheus metrics for application observability.
//!
//! Metrics are exposed on a dedicated listener when `METRICS_PORT` is set
//! (disabled by default). Recording functions are safe to call when no
//! exporter is installed; the `metrics` facade drops the samples.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `echo_service_requests_total` - Completed requests (labels: method, status)
//! - `echo_service_rate_limited_total` - Requests rejected by the rate limiter
//! - `echo_service_faults_total` - Faults rendered by the error translator (label: kind)
//!
//! ## Histograms
//! - `echo_service_request_duration_seconds` - Request duration (labels: method, status)
//!
//! ## Gauges
//! - `echo_service_shutting_down` - 1 once graceful shutdown has started
//!
//! # Usage
//!
//! ```rust,ignore
//! use echo_service::metrics::{try_init_metrics, record_request};
//!
//! try_init_metrics("0.0.0.0:9090".parse()?);
//! record_request("POST", 200, 0.002);
//! ```

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "echo_service_requests_total";
    pub const RATE_LIMITED_TOTAL: &str = "echo_service_rate_limited_total";
    pub const FAULTS_TOTAL: &str = "echo_service_faults_total";
    pub const REQUEST_DURATION_SECONDS: &str = "echo_service_request_duration_seconds";
    pub const SHUTTING_DOWN: &str = "echo_service_shutting_down";
}

/// Initialize the Prometheus metrics exporter.
///
/// # Errors
///
/// Returns a message if the exporter cannot be installed (for example the
/// port is taken or a recorder is already set).
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(names::REQUESTS_TOTAL, "Total number of completed HTTP requests");
    describe_counter!(
        names::RATE_LIMITED_TOTAL,
        "Total number of requests rejected by the rate limiter"
    );
    describe_counter!(
        names::FAULTS_TOTAL,
        "Total number of faults rendered into error responses"
    );
    describe_histogram!(
        names::REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        names::SHUTTING_DOWN,
        "Graceful shutdown state (1 = shutting down, 0 = running)"
    );
    set_shutting_down(false);

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Record a completed request.
pub fn record_request(method: &str, status: u16, duration_secs: f64) {
    let status = status.to_string();
    counter!(names::REQUESTS_TOTAL, "method" => method.to_string(), "status" => status.clone())
        .increment(1);
    histogram!(names::REQUEST_DURATION_SECONDS, "method" => method.to_string(), "status" => status)
        .record(duration_secs);
}

/// Record a request rejected by the rate limiter.
pub fn record_rate_limited() {
    counter!(names::RATE_LIMITED_TOTAL).increment(1);
}

/// Record a fault rendered by the error translator.
pub fn record_fault(kind: &'static str) {
    counter!(names::FAULTS_TOTAL, "kind" => kind).increment(1);
}

/// Update the shutdown gauge.
pub fn set_shutting_down(shutting_down: bool) {
    gauge!(names::SHUTTING_DOWN).set(if shutting_down { 1.0 } else { 0.0 });
}

#[cfg(test)]
mod tests {
    use super::*;

    // Without an installed recorder these calls are no-ops; they must not panic.

    #[test]
    fn test_record_request() {
        record_request("POST", 200, 0.1);
        record_request("GET", 503, 0.0);
    }

    #[test]
    fn test_record_rate_limited() {
        record_rate_limited();
    }

    #[test]
    fn test_record_fault() {
        record_fault("validation");
        record_fault("internal");
    }

    #[test]
    fn test_set_shutting_down() {
        set_shutting_down(true);
        set_shutting_down(false);
    }
}
