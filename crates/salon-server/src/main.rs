//! Relay binary: configuration, history store, and the accept loop.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use salon_server::{serve, Registry, ServerConfig};
use salon_store::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Tracing first (respects RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,salon_server=debug")),
        )
        .init();

    info!("Starting Salon relay v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    let store = Arc::new(Database::open_at(&config.db_path)?);
    let registry = Arc::new(Registry::new());

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Relay listening, waiting for connections");

    tokio::select! {
        result = serve(listener, registry, store, config) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "listener failed");
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
