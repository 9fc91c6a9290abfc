//! cqld - CQL native protocol server front end.
//!
//! Accepts client connections, negotiates a protocol version per connection,
//! and dispatches framed requests to the configured query backend.

use cqld_server::{Config, LogEventSink, NullBackend, Server, ServerConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if CQLD_CONFIG is set, then env overrides)
    let config = match Config::load() {
        Ok(c) => {
            if let Ok(path) = std::env::var("CQLD_CONFIG") {
                tracing::info!("loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if std::env::var("CQLD_CONFIG").is_ok() {
                tracing::error!("failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::info!("using default configuration");
            Config::default()
        }
    };

    tracing::info!("starting cqld");
    tracing::info!("  bind address: {}", config.network.bind_addr);
    tracing::info!("  max connections: {}", config.network.max_connections);
    tracing::info!(
        "  protocol versions: {}-{}",
        cqld_protocol::MIN_VERSION,
        cqld_protocol::MAX_VERSION
    );

    let server_config = ServerConfig {
        bind_addr: config.network.bind_addr,
        idle_timeout: config.network.idle_timeout(),
        max_connections: config.network.max_connections,
    };

    // No execution engine is wired in yet; every query gets a Void result.
    let server = Arc::new(Server::new(
        server_config,
        Arc::new(NullBackend),
        Arc::new(LogEventSink),
    ));

    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    server.run().await?;
    tracing::info!("server stopped");
    Ok(())
}
