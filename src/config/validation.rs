//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (worker count, backoff bounds, drain timeout)
//! - Check that addresses and log levels parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ServerConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Longest a single accept backoff or handler drain may delay shutdown.
const MAX_SHUTDOWN_DELAY_MS: u64 = 60_000;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration, collecting every violation.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.acceptor.workers == 0 {
        errors.push(ValidationError {
            field: "acceptor.workers",
            message: "must be at least 1".to_string(),
        });
    }

    if config.acceptor.error_backoff_base_ms > config.acceptor.error_backoff_max_ms {
        errors.push(ValidationError {
            field: "acceptor.error_backoff_base_ms",
            message: format!(
                "{} exceeds error_backoff_max_ms ({})",
                config.acceptor.error_backoff_base_ms, config.acceptor.error_backoff_max_ms
            ),
        });
    }

    if config.acceptor.error_backoff_max_ms > MAX_SHUTDOWN_DELAY_MS {
        errors.push(ValidationError {
            field: "acceptor.error_backoff_max_ms",
            message: format!("must be at most {} ms", MAX_SHUTDOWN_DELAY_MS),
        });
    }

    if config.acceptor.drain_timeout_ms == 0
        || config.acceptor.drain_timeout_ms > MAX_SHUTDOWN_DELAY_MS
    {
        errors.push(ValidationError {
            field: "acceptor.drain_timeout_ms",
            message: format!("must be between 1 and {} ms", MAX_SHUTDOWN_DELAY_MS),
        });
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError {
            field: "observability.log_level",
            message: format!("unknown level '{}'", config.observability.log_level),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError {
            field: "observability.metrics_address",
            message: format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_violation() {
        let mut config = ServerConfig::default();
        config.acceptor.workers = 0;
        config.acceptor.error_backoff_base_ms = 5000;
        config.acceptor.drain_timeout_ms = 0;
        config.observability.log_level = "loud".to_string();
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "not-an-address".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "acceptor.workers",
                "acceptor.error_backoff_base_ms",
                "acceptor.drain_timeout_ms",
                "observability.log_level",
                "observability.metrics_address",
            ]
        );
    }

    #[test]
    fn shutdown_delays_are_bounded() {
        let mut config = ServerConfig::default();
        config.acceptor.error_backoff_max_ms = 3_600_000;
        config.acceptor.drain_timeout_ms = 3_600_000;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["acceptor.error_backoff_max_ms", "acceptor.drain_timeout_ms"]
        );
    }

    #[test]
    fn metrics_address_ignored_when_disabled() {
        let mut config = ServerConfig::default();
        config.observability.metrics_address = "nowhere".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
