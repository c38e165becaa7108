//! Metrics collection and exposition.
//!
//! # Metrics
//! - `forge_requests_total` (counter): requests by method, status
//! - `forge_request_duration_seconds` (histogram): latency distribution
//! - `forge_service_health` (gauge): 2=healthy, 1=degraded, 0=unhealthy
//! - `forge_queue_messages_total` (counter): messages by type, outcome
//! - `forge_queue_batch_size` (histogram): delivered batch sizes
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::services::ServiceHealth;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    metrics::counter!(
        "forge_requests_total",
        "method" => method.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    metrics::histogram!(
        "forge_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_service_health(service: &'static str, health: ServiceHealth) {
    let value = match health {
        ServiceHealth::Healthy => 2.0,
        ServiceHealth::Degraded => 1.0,
        ServiceHealth::Unhealthy => 0.0,
    };
    metrics::gauge!("forge_service_health", "service" => service).set(value);
}

pub fn record_message_outcome(message_type: &str, outcome: &'static str) {
    metrics::counter!(
        "forge_queue_messages_total",
        "type" => message_type.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_batch_size(queue: &str, size: usize) {
    metrics::histogram!("forge_queue_batch_size", "queue" => queue.to_string())
        .record(size as f64);
}
