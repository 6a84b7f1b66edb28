//! Metrics collection and exposition.
//!
//! # Metrics
//! - `urt_requests_total` (counter): requests by method, status, route
//! - `urt_request_duration_seconds` (histogram): end-to-end latency
//! - `urt_external_calls_total` (counter): external calls by outcome
//! - `urt_external_call_duration_seconds` (histogram): external call latency
//! - `urt_correlation_total` (counter): claims by result
//! - `urt_correlation_evictions_total` (counter): pending requests evicted on insert
//! - `urt_pending_requests` (gauge): live pending requests
//!
//! Recording is a no-op until `init_metrics` installs the Prometheus exporter.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("route", route.to_string()),
    ];
    counter!("urt_requests_total", &labels).increment(1);
    histogram!("urt_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_external_call(outcome: &'static str, start: Instant) {
    counter!("urt_external_calls_total", "outcome" => outcome).increment(1);
    histogram!("urt_external_call_duration_seconds", "outcome" => outcome).record(start.elapsed().as_secs_f64());
}

pub fn record_correlation(result: &'static str) {
    counter!("urt_correlation_total", "result" => result).increment(1);
}

pub fn record_correlation_evictions(count: usize) {
    counter!("urt_correlation_evictions_total").increment(count as u64);
}

pub fn record_pending_requests(count: usize) {
    gauge!("urt_pending_requests").set(count as f64);
}
