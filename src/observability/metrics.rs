//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by entry point, status
//! - `gateway_request_duration_seconds` (histogram): time to response head
//! - `gateway_upstream_failures_total` (counter): failures by kind
//! - `gateway_relay_outcomes_total` (counter): completed / partial / disconnected
//! - `gateway_relayed_bytes_total` (counter): body bytes relayed to callers
//! - `gateway_in_flight` (gauge): exchanges in progress
//! - `gateway_pool_in_use` (gauge): upstream slots held
//!
//! # Design Decisions
//! - The `metrics` facade is a no-op until `init_metrics` installs a recorder
//! - Label values are static strings; no per-request cardinality

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(entry: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "entry" => entry,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "entry" => entry)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_failure(kind: &'static str) {
    metrics::counter!("gateway_upstream_failures_total", "kind" => kind).increment(1);
}

pub fn record_relay_outcome(outcome: &'static str, bytes: u64) {
    metrics::counter!("gateway_relay_outcomes_total", "outcome" => outcome).increment(1);
    metrics::counter!("gateway_relayed_bytes_total").increment(bytes);
}

pub fn exchange_started() {
    metrics::gauge!("gateway_in_flight").increment(1.0);
}

pub fn exchange_finished() {
    metrics::gauge!("gateway_in_flight").decrement(1.0);
}

pub fn pool_slot_acquired() {
    metrics::gauge!("gateway_pool_in_use").increment(1.0);
}

pub fn pool_slot_released() {
    metrics::gauge!("gateway_pool_in_use").decrement(1.0);
}
