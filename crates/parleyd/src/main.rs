//! # parleyd
//!
//! parley relay server binary — resolves configuration, initializes logging
//! and metrics, and runs the HTTP/WebSocket server until interrupted.

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use parley_server::config::ServerConfig;
use parley_server::server::RelayServer;
use tracing_subscriber::EnvFilter;

/// parley relay server.
#[derive(Parser, Debug)]
#[command(name = "parleyd", about = "Real-time presence-and-broadcast relay")]
struct Cli {
    /// Host to bind (overrides PARLEY_HOST).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides PARLEY_PORT; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Log filter (overrides PARLEY_LOG, e.g. `info,parley_server=debug`).
    #[arg(long)]
    log: Option<String>,
}

/// Resolve the effective config: defaults ← environment ← CLI flags.
fn resolve_config(cli: &Cli) -> ServerConfig {
    let mut config = ServerConfig::from_env();
    if let Some(host) = &cli.host {
        config.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    config
}

fn init_logging(filter: Option<&str>) {
    let filter = filter.map_or_else(
        || EnvFilter::try_from_env("PARLEY_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        EnvFilter::new,
    );
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging(args.log.as_deref());

    let config = resolve_config(&args);
    let metrics_handle = parley_server::metrics::install_recorder();

    let server = RelayServer::new(config).with_metrics(metrics_handle);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("parley relay listening on http://{addr} (WebSocket endpoint at /ws)");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().graceful_shutdown(vec![handle], None).await;
    tracing::info!("Shutdown complete");
    Ok(())
}
