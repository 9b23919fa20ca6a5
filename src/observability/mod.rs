//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! ConnectionFactory / AcceptLoop produce:
//!     → events.rs (FactoryObserver callbacks)
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The factory talks to an injected observer, never to a global logger
//! - Metrics are cheap (atomic increments)

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{FactoryObserver, TracingObserver};
