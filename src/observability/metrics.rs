//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mesh_breaker_state` (gauge): 0=closed, 1=open, 2=half_open, per dependency
//! - `mesh_circuit_rejections_total` (counter): fail-fast rejections, per dependency
//! - `mesh_downstream_attempts_total` (counter): attempts by dependency and outcome
//! - `mesh_rate_limited_total` (counter): rejected inbound requests, per route
//! - `mesh_token_refresh_total` (counter): service tokens minted
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_breaker_state(dependency: &str, state: CircuitState) {
    gauge!("mesh_breaker_state", "dependency" => dependency.to_string()).set(state.as_gauge());
}

pub fn record_circuit_rejection(dependency: &str) {
    counter!("mesh_circuit_rejections_total", "dependency" => dependency.to_string()).increment(1);
}

pub fn record_downstream_attempt(dependency: &str, outcome: &'static str) {
    counter!(
        "mesh_downstream_attempts_total",
        "dependency" => dependency.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_rate_limited(route: &str) {
    counter!("mesh_rate_limited_total", "route" => route.to_string()).increment(1);
}

pub fn record_token_refresh() {
    counter!("mesh_token_refresh_total").increment(1);
}
