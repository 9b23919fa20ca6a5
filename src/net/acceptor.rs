//! Accept loop driving a [`ConnectionFactory`].
//!
//! # Responsibilities
//! - Run a pool of worker tasks, each calling `create_connection` in a loop
//! - Spawn one handler task per accepted connection
//! - Stop cleanly when the factory is closed
//! - Back off on transient accept failures
//!
//! # Design Decisions
//! - `AcceptError::Closed` is the stop signal, never logged as a fault
//! - Bind failures end the loop and close the factory; rebinding is up to
//!   the owner's startup logic
//! - Handler errors are logged per connection and never stop the loop
//! - In-flight handlers are awaited before `run` returns, up to the drain
//!   timeout; stragglers are aborted
//! - Backoff sleeps end early when the factory closes

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::config::AcceptorConfig;
use crate::net::connection::Connection;
use crate::net::factory::{AcceptError, ConnectionFactory, FactoryError};
use crate::observability::metrics;
use crate::resilience::backoff::FailureBackoff;

/// Error a connection handler may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Totals reported when an accept loop finishes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AcceptSummary {
    /// Connections handed to the handler.
    pub accepted: u64,
    /// Accepts that failed with a transport error.
    pub accept_errors: u64,
}

impl AcceptSummary {
    fn merge(&mut self, other: AcceptSummary) {
        self.accepted += other.accepted;
        self.accept_errors += other.accept_errors;
    }
}

/// Drives a shared factory with `workers` concurrent acceptors.
pub struct AcceptLoop {
    factory: Arc<ConnectionFactory>,
    config: AcceptorConfig,
}

impl AcceptLoop {
    pub fn new(factory: Arc<ConnectionFactory>, config: AcceptorConfig) -> Self {
        Self { factory, config }
    }

    /// Accept until the factory is closed, handing each connection to
    /// `handler`.
    ///
    /// Returns the totals once every worker and handler has finished, or
    /// the first bind error.
    pub async fn run<F, Fut>(self, handler: F) -> Result<AcceptSummary, FactoryError>
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let workers = self.config.workers.max(1);

        tracing::info!(workers, "Accept loop starting");

        let mut tasks = JoinSet::new();
        for index in 0..workers {
            tasks.spawn(worker(
                index,
                Arc::clone(&self.factory),
                Arc::clone(&handler),
                self.config.clone(),
            ));
        }

        let mut summary = AcceptSummary::default();
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(stats)) => summary.merge(stats),
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        tracing::error!(error = %e, "Acceptor worker failed, closing factory");
                        self.factory.close();
                        first_error = Some(e);
                    }
                }
                Err(e) => tracing::error!(error = %e, "Acceptor worker panicked"),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::info!(
                    accepted = summary.accepted,
                    accept_errors = summary.accept_errors,
                    "Accept loop stopped"
                );
                Ok(summary)
            }
        }
    }
}

async fn worker<F, Fut>(
    index: usize,
    factory: Arc<ConnectionFactory>,
    handler: Arc<F>,
    config: AcceptorConfig,
) -> Result<AcceptSummary, FactoryError>
where
    F: Fn(Connection) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    let mut backoff = FailureBackoff::new(&config);
    let mut handlers = JoinSet::new();
    let mut stats = AcceptSummary::default();

    let outcome = loop {
        match factory.create_connection().await {
            Ok(conn) => {
                backoff.reset();
                stats.accepted += 1;
                handlers.spawn(serve(Arc::clone(&handler), conn));
                while let Some(finished) = handlers.try_join_next() {
                    log_handler_panic(finished);
                }
            }
            Err(FactoryError::Accept(AcceptError::Closed)) => {
                tracing::debug!(worker = index, "Factory closed, worker stopping");
                break Ok(());
            }
            Err(FactoryError::Accept(AcceptError::Io(e))) => {
                stats.accept_errors += 1;
                let delay = backoff.next_delay();
                tracing::warn!(
                    worker = index,
                    error = %e,
                    consecutive_failures = backoff.consecutive_failures(),
                    retry_in_ms = delay.as_millis() as u64,
                    "Accept failed"
                );
                if !wait_backoff(&factory, delay).await {
                    tracing::debug!(worker = index, "Factory closed during backoff");
                    break Ok(());
                }
            }
            Err(e) => break Err(e),
        }
    };

    drain(index, &mut handlers, config.drain_timeout()).await;

    outcome.map(|()| stats)
}

/// Sleep for `delay` unless the factory closes first. Returns `false` if
/// it closed.
async fn wait_backoff(factory: &ConnectionFactory, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = factory.closed() => false,
    }
}

async fn drain(worker: usize, handlers: &mut JoinSet<()>, limit: Duration) {
    let drained = tokio::time::timeout(limit, async {
        while let Some(finished) = handlers.join_next().await {
            log_handler_panic(finished);
        }
    })
    .await;

    if drained.is_err() {
        tracing::warn!(
            worker,
            remaining = handlers.len(),
            drain_timeout_ms = limit.as_millis() as u64,
            "Handlers still running after drain timeout, aborting"
        );
        handlers.abort_all();
        while let Some(finished) = handlers.join_next().await {
            log_handler_panic(finished);
        }
    }
}

async fn serve<F, Fut>(handler: Arc<F>, conn: Connection)
where
    F: Fn(Connection) -> Fut,
    Fut: Future<Output = Result<(), HandlerError>>,
{
    let id = conn.id();
    let peer_addr = conn.peer_addr();

    let _open = OpenConnection::new();
    if let Err(e) = (*handler)(conn).await {
        tracing::warn!(
            connection_id = %id,
            peer_addr = %peer_addr,
            error = %e,
            "Connection handler failed"
        );
    }
}

/// Holds the open-connections gauge up for one handler, including one
/// aborted mid-flight.
struct OpenConnection;

impl OpenConnection {
    fn new() -> Self {
        metrics::connection_opened();
        Self
    }
}

impl Drop for OpenConnection {
    fn drop(&mut self) {
        metrics::connection_closed();
    }
}

fn log_handler_panic(result: Result<(), tokio::task::JoinError>) {
    match result {
        Err(e) if e.is_panic() => tracing::error!(error = %e, "Connection handler panicked"),
        Err(e) => tracing::debug!(error = %e, "Connection handler aborted"),
        Ok(()) => {}
    }
}
