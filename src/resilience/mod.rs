//! Resilience subsystem.
//!
//! # Design Decisions
//! - Transient accept failures (fd exhaustion, aborted handshakes) back off
//!   with jitter instead of spinning
//! - Bind failures are never retried here; that belongs to startup logic

pub mod backoff;
