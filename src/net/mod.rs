//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! First create_connection()
//!     → factory.rs (bind once under the init guard, publish listener)
//! Every create_connection()
//!     → factory.rs (lock-free load, accept racing the closed flag)
//!     → connection.rs (owned stream handed to the caller)
//!     → acceptor.rs (spawn handler, loop until closed)
//!
//! Factory States:
//!     Uninitialized → Bound → Closed
//!     Uninitialized → Closed
//! ```
//!
//! # Design Decisions
//! - Exactly one bind per factory, no matter how many callers race
//! - No lock is held while waiting for a connection
//! - Close is a clean stop signal, distinct from transport errors

pub mod acceptor;
pub mod connection;
pub mod factory;

pub use acceptor::{AcceptLoop, AcceptSummary, HandlerError};
pub use connection::{Connection, ConnectionId};
pub use factory::{AcceptError, ConnectionFactory, FactoryError, FactoryState};
