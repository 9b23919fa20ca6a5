//! Shutdown coordination for the server.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::net::ConnectionFactory;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Close `factory` when shutdown is triggered or this coordinator is
    /// dropped.
    pub fn close_on_trigger(&self, factory: Arc<ConnectionFactory>) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            // Lagged cannot happen with a single message; Closed means the
            // coordinator is gone, which is shutdown too.
            let _ = rx.recv().await;
            factory.close();
        })
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListenerConfig;
    use crate::net::FactoryState;

    #[tokio::test]
    async fn trigger_closes_factory() {
        let shutdown = Shutdown::new();
        let factory = Arc::new(ConnectionFactory::new(ListenerConfig::default()));

        let closer = shutdown.close_on_trigger(factory.clone());
        assert_eq!(shutdown.receiver_count(), 1);
        assert_eq!(factory.state(), FactoryState::Uninitialized);

        shutdown.trigger();
        closer.await.unwrap();
        assert_eq!(factory.state(), FactoryState::Closed);
    }

    #[tokio::test]
    async fn dropping_coordinator_closes_factory() {
        let shutdown = Shutdown::new();
        let factory = Arc::new(ConnectionFactory::new(ListenerConfig::default()));

        let closer = shutdown.close_on_trigger(factory.clone());
        drop(shutdown);
        closer.await.unwrap();
        assert!(factory.is_closed());
    }
}
