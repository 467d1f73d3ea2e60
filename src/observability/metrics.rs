//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_builds_total` (counter): build attempts by chain, outcome
//! - `gateway_broadcasts_total` (counter): broadcast attempts by chain, outcome
//! - `gateway_rpc_duration_seconds` (histogram): latency per RPC operation
//! - `gateway_pool_connections` (gauge): live connection handles
//!
//! Recording is a no-op until a recorder is installed.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_build(chain: &str, outcome: &'static str) {
    counter!("gateway_builds_total", "chain" => chain.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_broadcast(chain: &str, outcome: &'static str) {
    counter!("gateway_broadcasts_total", "chain" => chain.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_rpc_duration(operation: &'static str, elapsed: Duration) {
    histogram!("gateway_rpc_duration_seconds", "operation" => operation)
        .record(elapsed.as_secs_f64());
}

pub fn record_pool_size(size: usize) {
    gauge!("gateway_pool_connections").set(size as f64);
}
