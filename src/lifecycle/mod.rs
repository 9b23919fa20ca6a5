//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → ConnectionFactory::close() → pending accepts fail Closed
//!     → AcceptLoop workers stop → in-flight handlers drain → run() returns
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, return
//! - Closing the factory is the only stop mechanism the accept loop needs

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
