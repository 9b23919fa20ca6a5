//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use socket_rpc_server::observability::FactoryObserver;
use socket_rpc_server::{ConnectionFactory, ListenerConfig};

/// Upper bound for any single await in a test.
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Observer that counts lifecycle events instead of logging them.
#[derive(Default)]
pub struct CountingObserver {
    binds: AtomicUsize,
    accepts: AtomicUsize,
    closes: AtomicUsize,
}

impl CountingObserver {
    pub fn binds(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }

    pub fn accepts(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl FactoryObserver for CountingObserver {
    fn on_bind(&self, _local_addr: SocketAddr) {
        // Widen the window in which other callers race the first bind.
        std::thread::sleep(Duration::from_millis(20));
        self.binds.fetch_add(1, Ordering::SeqCst);
    }

    fn on_accept(&self, _id: socket_rpc_server::net::ConnectionId, _peer_addr: SocketAddr) {
        self.accepts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_close(&self, _local_addr: Option<SocketAddr>) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Loopback listener config on `port`.
pub fn loopback(port: u16) -> ListenerConfig {
    ListenerConfig {
        port,
        backlog: 0,
        bind_address: Some("127.0.0.1".parse().unwrap()),
    }
}

/// Factory on a loopback ephemeral port with a counting observer.
pub fn counted_factory(port: u16) -> (Arc<ConnectionFactory>, Arc<CountingObserver>) {
    let observer = Arc::new(CountingObserver::default());
    let factory = ConnectionFactory::with_observer(loopback(port), observer.clone());
    (Arc::new(factory), observer)
}

/// A loopback port that was free a moment ago.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Wait until some caller has bound the factory's socket.
pub async fn wait_for_bind(factory: &ConnectionFactory) -> SocketAddr {
    tokio::time::timeout(TIMEOUT, async {
        loop {
            if let Some(addr) = factory.local_addr() {
                return addr;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("factory never bound")
}
