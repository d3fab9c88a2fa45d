//! Metrics collection and exposition.
//!
//! # Metrics
//! - `content_requests_total` (counter): requests by method, status
//! - `content_request_duration_seconds` (histogram): latency distribution
//! - `content_table_rebuilds_total` (counter): installs attempted, by trigger
//! - `content_table_build_seconds` (histogram): time to build a table
//! - `content_table_routes` (gauge): entries in the last built table
//! - `content_access_denied_total` (counter): guard rejections
//! - `content_sessions_swept_total` (counter): aged sessions removed

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`. Must run inside the runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "content_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("content_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rebuild(trigger: &'static str, elapsed: Duration, routes: usize) {
    metrics::counter!("content_table_rebuilds_total", "trigger" => trigger).increment(1);
    metrics::histogram!("content_table_build_seconds").record(elapsed.as_secs_f64());
    metrics::gauge!("content_table_routes").set(routes as f64);
}

pub fn record_access_denied() {
    metrics::counter!("content_access_denied_total").increment(1);
}

pub fn record_sessions_swept(count: usize) {
    metrics::counter!("content_sessions_swept_total").increment(count as u64);
}
