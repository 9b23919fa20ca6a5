//! Server-side connection acceptance for a socket RPC transport.
//!
//! A [`ConnectionFactory`] owns one listening socket, bound lazily by the
//! first caller of [`ConnectionFactory::create_connection`] no matter how
//! many callers race. Accepted connections are handed to the caller, which
//! reads and writes framed RPC messages on them. Closing the factory wakes
//! every pending accept with [`AcceptError::Closed`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use socket_rpc_server::net::HandlerError;
//! use socket_rpc_server::{AcceptLoop, ConnectionFactory, ServerConfig, Shutdown};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::default();
//! let factory = Arc::new(ConnectionFactory::new(config.listener.clone()));
//! let shutdown = Shutdown::new();
//! shutdown.close_on_trigger(factory.clone());
//!
//! let summary = AcceptLoop::new(factory, config.acceptor.clone())
//!     .run(|conn| async move {
//!         // hand `conn` to the dispatcher
//!         conn.close().await?;
//!         Ok::<_, HandlerError>(())
//!     })
//!     .await?;
//! println!("accepted {}", summary.accepted);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::{ListenerConfig, ServerConfig};
pub use lifecycle::Shutdown;
pub use net::{
    AcceptError, AcceptLoop, AcceptSummary, Connection, ConnectionFactory, FactoryError,
    FactoryState,
};
