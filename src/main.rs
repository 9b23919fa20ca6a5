//! Socket RPC listener.
//!
//! Loads a TOML configuration, binds a connection factory and runs the
//! accept loop until SIGINT/SIGTERM. Connections are echoed back to the
//! client, standing in for an RPC dispatcher.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::AsyncWriteExt;

use socket_rpc_server::config::{load_config, ServerConfig};
use socket_rpc_server::lifecycle::{signals, Shutdown};
use socket_rpc_server::net::{AcceptLoop, Connection, ConnectionFactory, HandlerError};
use socket_rpc_server::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "socket-rpc-server")]
#[command(about = "Accept socket RPC connections", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the bind address.
    #[arg(short, long)]
    bind: Option<IpAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    if let Some(bind) = cli.bind {
        config.listener.bind_address = Some(bind);
    }

    logging::init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.socket_addr(),
        backlog = config.listener.effective_backlog(),
        workers = config.acceptor.workers,
        "socket-rpc-server starting"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let factory = Arc::new(ConnectionFactory::new(config.listener.clone()));
    let shutdown = Shutdown::new();
    shutdown.close_on_trigger(factory.clone());

    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    let summary = AcceptLoop::new(factory, config.acceptor.clone())
        .run(echo)
        .await?;

    tracing::info!(accepted = summary.accepted, "Shutdown complete");
    Ok(())
}

async fn echo(conn: Connection) -> Result<(), HandlerError> {
    let (mut reader, mut writer) = tokio::io::split(conn);
    tokio::io::copy(&mut reader, &mut writer).await?;
    writer.shutdown().await?;
    Ok(())
}
