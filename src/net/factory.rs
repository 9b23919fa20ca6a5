//! Lazily-bound listening socket shared by concurrent acceptors.
//!
//! # Responsibilities
//! - Bind exactly one listening socket per factory, on first use
//! - Hand out accepted connections one call at a time
//! - Close idempotently, waking every pending accept
//!
//! # Design Decisions
//! - The bound listener is published through an `ArcSwapOption`, so the
//!   fast path of `create_connection` takes no lock
//! - The init guard is a synchronous mutex held only inside `init_listener`;
//!   it is never held across the accept `.await`
//! - Close flips a `watch` flag under the same guard, so close and bind are
//!   strictly ordered and a closed factory never binds
//! - A failed bind publishes nothing; the next caller binds on its own

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwapOption;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::watch;

use crate::config::ListenerConfig;
use crate::net::connection::{Connection, ConnectionId};
use crate::observability::{FactoryObserver, TracingObserver};

/// Why a blocking accept returned without a connection.
#[derive(Debug, thiserror::Error)]
pub enum AcceptError {
    /// The factory was closed before or during the wait.
    #[error("connection factory is closed")]
    Closed,

    /// The transport reported an error.
    #[error("accept failed: {0}")]
    Io(#[source] io::Error),
}

/// Error type for connection factory operations.
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    /// The listening socket could not be created or bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Waiting for a connection failed.
    #[error(transparent)]
    Accept(#[from] AcceptError),
}

impl FactoryError {
    /// True when the factory was closed on purpose. Accept loops should
    /// treat this as a stop signal rather than a fault.
    pub fn is_closed(&self) -> bool {
        matches!(self, FactoryError::Accept(AcceptError::Closed))
    }
}

/// Lifecycle of a [`ConnectionFactory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryState {
    /// No socket has been bound yet.
    Uninitialized,
    /// A socket is bound and accepting.
    Bound,
    /// Terminal. No socket is held and none will be bound.
    Closed,
}

/// Accepts connections on a listening socket bound on first use.
///
/// Share it behind an `Arc` between any number of acceptor tasks. The first
/// `create_connection` binds; all callers then accept from that same socket.
pub struct ConnectionFactory {
    config: ListenerConfig,
    listener: ArcSwapOption<TcpListener>,
    init_lock: Mutex<()>,
    closed: watch::Sender<bool>,
    observer: Arc<dyn FactoryObserver>,
}

impl ConnectionFactory {
    /// Create a factory. Performs no I/O.
    pub fn new(config: ListenerConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// Create a factory reporting lifecycle events to `observer`.
    pub fn with_observer(config: ListenerConfig, observer: Arc<dyn FactoryObserver>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            config,
            listener: ArcSwapOption::empty(),
            init_lock: Mutex::new(()),
            closed,
            observer,
        }
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Address the socket is bound to, once it is.
    ///
    /// Useful with port 0 to learn the port the OS picked.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener
            .load()
            .as_ref()
            .and_then(|listener| listener.local_addr().ok())
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    pub fn state(&self) -> FactoryState {
        if self.is_closed() {
            FactoryState::Closed
        } else if self.listener.load().is_some() {
            FactoryState::Bound
        } else {
            FactoryState::Uninitialized
        }
    }

    /// Wait for the next incoming connection.
    ///
    /// Binds the listening socket if no caller has yet. Returns
    /// [`AcceptError::Closed`] as soon as [`close`](Self::close) has been
    /// called, whether before or during the wait.
    pub async fn create_connection(&self) -> Result<Connection, FactoryError> {
        let listener = match self.listener.load_full() {
            Some(listener) => listener,
            None => self.init_listener()?,
        };

        let mut closed = self.closed.subscribe();
        tokio::select! {
            biased;
            _ = closed.wait_for(|is_closed| *is_closed) => Err(AcceptError::Closed.into()),
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    let id = ConnectionId::new();
                    self.observer.on_accept(id, peer_addr);
                    Ok(Connection::new(id, stream, peer_addr))
                }
                Err(e) => {
                    self.observer.on_accept_error(&e);
                    Err(AcceptError::Io(e).into())
                }
            },
        }
    }

    /// Resolve once the factory is closed. Returns immediately if it
    /// already is.
    pub async fn closed(&self) {
        let mut closed = self.closed.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = closed.wait_for(|is_closed| *is_closed).await;
    }

    /// Close the listening socket.
    ///
    /// Idempotent and infallible. Pending and future `create_connection`
    /// calls fail with [`AcceptError::Closed`]. The OS socket is released
    /// once pending accepts have returned.
    pub fn close(&self) {
        let _guard = self.lock_init();
        let was_closed = self.closed.send_replace(true);
        let listener = self.listener.swap(None);
        if !was_closed {
            let local_addr = listener.as_ref().and_then(|l| l.local_addr().ok());
            self.observer.on_close(local_addr);
        }
    }

    fn init_listener(&self) -> Result<Arc<TcpListener>, FactoryError> {
        let _guard = self.lock_init();

        if self.is_closed() {
            return Err(AcceptError::Closed.into());
        }
        // Another caller may have bound while we waited for the guard.
        if let Some(listener) = self.listener.load_full() {
            return Ok(listener);
        }

        let listener = Arc::new(self.bind()?);
        self.listener.store(Some(Arc::clone(&listener)));
        Ok(listener)
    }

    fn bind(&self) -> Result<TcpListener, FactoryError> {
        let addr = self.config.socket_addr();
        let bind_error = |source: io::Error| FactoryError::Bind { addr, source };

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_error)?;

        #[cfg(not(windows))]
        socket.set_reuseaddr(true).map_err(bind_error)?;

        socket.bind(addr).map_err(bind_error)?;
        let listener = socket
            .listen(self.config.effective_backlog())
            .map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        self.observer.on_bind(local_addr);
        Ok(listener)
    }

    // The guard protects no data, so a panic while holding it leaves
    // nothing inconsistent.
    fn lock_init(&self) -> MutexGuard<'_, ()> {
        self.init_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ConnectionFactory {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ConnectionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionFactory")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    #[derive(Default)]
    struct Counts {
        binds: AtomicUsize,
        closes: AtomicUsize,
    }

    impl FactoryObserver for Counts {
        fn on_bind(&self, _local_addr: SocketAddr) {
            self.binds.fetch_add(1, Ordering::SeqCst);
        }

        fn on_close(&self, _local_addr: Option<SocketAddr>) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn loopback() -> ListenerConfig {
        ListenerConfig {
            bind_address: Some("127.0.0.1".parse().unwrap()),
            ..ListenerConfig::default()
        }
    }

    fn counted_factory() -> (Arc<ConnectionFactory>, Arc<Counts>) {
        let counts = Arc::new(Counts::default());
        let factory = ConnectionFactory::with_observer(loopback(), counts.clone());
        (Arc::new(factory), counts)
    }

    #[test]
    fn construction_performs_no_io() {
        let (factory, counts) = counted_factory();
        assert_eq!(factory.state(), FactoryState::Uninitialized);
        assert_eq!(factory.local_addr(), None);
        assert_eq!(counts.binds.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn close_before_bind_is_noop_and_idempotent() {
        let (factory, counts) = counted_factory();
        factory.close();
        factory.close();
        factory.close();
        assert_eq!(factory.state(), FactoryState::Closed);
        assert_eq!(counts.closes.load(Ordering::SeqCst), 1);
        assert_eq!(counts.binds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn closed_factory_never_binds() {
        let (factory, counts) = counted_factory();
        factory.close();

        for _ in 0..3 {
            let err = factory.create_connection().await.unwrap_err();
            assert!(err.is_closed());
        }
        assert_eq!(counts.binds.load(Ordering::SeqCst), 0);
        assert_eq!(factory.local_addr(), None);
    }

    #[tokio::test]
    async fn first_call_binds_and_accepts() {
        let (factory, counts) = counted_factory();

        let acceptor = tokio::spawn({
            let factory = factory.clone();
            async move { factory.create_connection().await }
        });

        let addr = loop {
            if let Some(addr) = factory.local_addr() {
                break addr;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        assert_eq!(factory.state(), FactoryState::Bound);
        assert_ne!(addr.port(), 0);

        let client = TcpStream::connect(addr).await.unwrap();
        let conn = timeout(Duration::from_secs(5), acceptor)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(conn.peer_addr(), client.local_addr().unwrap());
        assert_eq!(counts.binds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_wakes_pending_accept() {
        let (factory, counts) = counted_factory();

        let acceptor = tokio::spawn({
            let factory = factory.clone();
            async move { factory.create_connection().await }
        });
        while factory.local_addr().is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        factory.close();
        let err = timeout(Duration::from_secs(5), acceptor)
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();
        assert!(err.is_closed());
        assert_eq!(factory.local_addr(), None);
        assert_eq!(counts.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bind_error_carries_address() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();

        let config = ListenerConfig {
            port,
            ..loopback()
        };
        let factory = ConnectionFactory::new(config);

        let err = factory.create_connection().await.unwrap_err();
        match &err {
            FactoryError::Bind { addr, .. } => assert_eq!(addr.port(), port),
            other => panic!("expected bind error, got {other}"),
        }
        assert!(!err.is_closed());
        assert_eq!(factory.state(), FactoryState::Uninitialized);
    }

    #[tokio::test]
    async fn closed_resolves_on_close() {
        let (factory, _counts) = counted_factory();

        let waiter = tokio::spawn({
            let factory = factory.clone();
            async move { factory.closed().await }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        factory.close();
        timeout(Duration::from_secs(5), waiter).await.unwrap().unwrap();

        // Already closed: returns at once.
        timeout(Duration::from_millis(100), factory.closed())
            .await
            .unwrap();
    }

    #[test]
    fn io_accept_error_is_not_closed() {
        let err: FactoryError =
            AcceptError::Io(io::Error::new(io::ErrorKind::Other, "boom")).into();
        assert!(!err.is_closed());
        assert_eq!(err.to_string(), "accept failed: boom");
    }
}
