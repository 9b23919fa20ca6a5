//! Listener lifecycle events.
//!
//! A [`ConnectionFactory`](crate::net::ConnectionFactory) reports what it does
//! through a [`FactoryObserver`]. The factory's behavior never depends on the
//! observer, so tests can swap in their own to count binds.

use std::net::SocketAddr;

use crate::net::connection::ConnectionId;
use crate::observability::metrics;

/// Receives lifecycle events from a connection factory.
///
/// Every method has an empty default. Implementations must not block.
pub trait FactoryObserver: Send + Sync {
    /// A listening socket was bound to `local_addr`.
    fn on_bind(&self, _local_addr: SocketAddr) {}

    /// A connection from `peer_addr` was accepted.
    fn on_accept(&self, _id: ConnectionId, _peer_addr: SocketAddr) {}

    /// An accept failed for a reason other than the factory closing.
    fn on_accept_error(&self, _error: &std::io::Error) {}

    /// The factory transitioned to closed. `local_addr` is set if a socket
    /// had been bound.
    fn on_close(&self, _local_addr: Option<SocketAddr>) {}
}

/// Default observer: structured log events plus metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl FactoryObserver for TracingObserver {
    fn on_bind(&self, local_addr: SocketAddr) {
        metrics::record_bind();
        tracing::info!(
            address = %local_addr.ip(),
            port = local_addr.port(),
            "Listening for requests"
        );
    }

    fn on_accept(&self, id: ConnectionId, peer_addr: SocketAddr) {
        metrics::record_accept();
        tracing::debug!(connection_id = %id, peer_addr = %peer_addr, "Connection accepted");
    }

    fn on_accept_error(&self, error: &std::io::Error) {
        metrics::record_accept_error("io");
        tracing::debug!(error = %error, "Accept failed");
    }

    fn on_close(&self, local_addr: Option<SocketAddr>) {
        metrics::record_close();
        match local_addr {
            Some(addr) => tracing::info!(address = %addr, "Listener closed"),
            None => tracing::info!("Connection factory closed before binding"),
        }
    }
}
