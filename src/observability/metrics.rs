//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by deciding stage and outcome
//! - `gateway_rate_limited_total` (counter): 429s by route segment
//! - `gateway_csrf_rejected_total` (counter): 403s from the CSRF stage
//! - `gateway_auth_failures_total` (counter): auth gate failures by kind
//! - `gateway_upstream_duration_seconds` (histogram): upstream latency by status

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record the stage that decided a request and what it decided.
pub fn record_decision(stage: &'static str, outcome: &'static str) {
    counter!("gateway_requests_total", "stage" => stage, "outcome" => outcome).increment(1);
}

pub fn record_rate_limited(route: &str) {
    counter!("gateway_rate_limited_total", "route" => route.to_string()).increment(1);
}

pub fn record_csrf_rejected() {
    counter!("gateway_csrf_rejected_total").increment(1);
}

pub fn record_auth_failure(kind: &'static str) {
    counter!("gateway_auth_failures_total", "kind" => kind).increment(1);
}

pub fn record_upstream(status: u16, start: Instant) {
    histogram!("gateway_upstream_duration_seconds", "status" => status.to_string())
        .record(start.elapsed().as_secs_f64());
}
