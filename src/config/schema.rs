//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every section defaults, so an empty file is a valid configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backlog used when the configured value is zero or negative.
///
/// Matches the value tokio passes to `listen(2)` in `TcpListener::bind`.
pub const DEFAULT_BACKLOG: u32 = 1024;

/// Root configuration for the RPC server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening socket settings.
    pub listener: ListenerConfig,

    /// Accept loop settings.
    pub acceptor: AcceptorConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Listening socket configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Port to listen on. 0 lets the OS pick an ephemeral port.
    pub port: u16,

    /// Maximum length of the pending connection queue.
    /// Zero or negative uses [`DEFAULT_BACKLOG`].
    pub backlog: i32,

    /// Local address to bind. `None` binds every IPv4 interface.
    pub bind_address: Option<IpAddr>,
}

impl ListenerConfig {
    /// Listener on `port` with the default backlog on all interfaces.
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// The socket address the listener binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        let ip = self
            .bind_address
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        SocketAddr::new(ip, self.port)
    }

    /// Backlog passed to `listen(2)`.
    pub fn effective_backlog(&self) -> u32 {
        if self.backlog > 0 {
            self.backlog as u32
        } else {
            DEFAULT_BACKLOG
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            backlog: 0,
            bind_address: None,
        }
    }
}

/// Accept loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AcceptorConfig {
    /// Number of worker tasks calling `create_connection` concurrently.
    pub workers: usize,

    /// Base delay after a failed accept, in milliseconds.
    pub error_backoff_base_ms: u64,

    /// Upper bound for the accept failure backoff, in milliseconds.
    pub error_backoff_max_ms: u64,

    /// How long a stopping worker waits for its in-flight handlers before
    /// aborting them, in milliseconds.
    pub drain_timeout_ms: u64,
}

impl AcceptorConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl Default for AcceptorConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            error_backoff_base_ms: 50,
            error_backoff_max_ms: 1000,
            drain_timeout_ms: 5000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output for development.
    #[default]
    Pretty,
    /// One JSON object per line for log aggregation.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Serve Prometheus metrics.
    pub metrics_enabled: bool,

    /// Address of the metrics endpoint.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}
