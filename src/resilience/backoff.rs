//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::AcceptorConfig;

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Tracks consecutive failures of one acceptor worker.
#[derive(Debug, Clone)]
pub struct FailureBackoff {
    base_ms: u64,
    max_ms: u64,
    consecutive_failures: u32,
}

impl FailureBackoff {
    pub fn new(config: &AcceptorConfig) -> Self {
        Self {
            base_ms: config.error_backoff_base_ms,
            max_ms: config.error_backoff_max_ms,
            consecutive_failures: 0,
        }
    }

    /// Record a failure and return how long to wait before trying again.
    pub fn next_delay(&mut self) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        calculate_backoff(self.consecutive_failures, self.base_ms, self.max_ms)
    }

    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
