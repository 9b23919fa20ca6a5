//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define listener metrics (binds, accepts, accept errors, closes)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `rpc_listener_binds_total` (counter): listening sockets bound
//! - `rpc_connections_accepted_total` (counter): connections handed out
//! - `rpc_accept_errors_total` (counter): failed accepts by `kind`
//! - `rpc_listener_closes_total` (counter): factories closed
//! - `rpc_active_connections` (gauge): connections held by handlers
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users
//!   and tests pay nothing

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

pub fn record_bind() {
    metrics::counter!("rpc_listener_binds_total").increment(1);
}

pub fn record_accept() {
    metrics::counter!("rpc_connections_accepted_total").increment(1);
}

pub fn record_accept_error(kind: &'static str) {
    metrics::counter!("rpc_accept_errors_total", "kind" => kind).increment(1);
}

pub fn record_close() {
    metrics::counter!("rpc_listener_closes_total").increment(1);
}

pub fn connection_opened() {
    metrics::gauge!("rpc_active_connections").increment(1.0);
}

pub fn connection_closed() {
    metrics::gauge!("rpc_active_connections").decrement(1.0);
}
