//! # salon-server
//!
//! The Salon relay: accepts TCP connections, authenticates each with a
//! unique display name, relays chat text and chunked file transfers to all
//! other connected peers, persists message history, and announces presence
//! changes.
//!
//! Exposed as a library so integration tests can drive a real listener on
//! an ephemeral port; the binary in `main.rs` is a thin wrapper.

pub mod config;
pub mod connection;
pub mod registry;

mod error;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

pub use config::ServerConfig;
pub use error::ServerError;
pub use registry::Registry;

use salon_store::Database;

/// Perpetual accept loop: one handler task per accepted connection.
///
/// Runs until the listener fails; shutdown is effected by dropping the
/// future (and with it the listener), which unblocks pending clients with
/// end-of-stream.
pub async fn serve(
    listener: TcpListener,
    registry: Arc<Registry>,
    store: Arc<Database>,
    config: ServerConfig,
) -> Result<(), ServerError> {
    loop {
        let (stream, addr) = listener.accept().await?;
        info!(peer = %addr, clients = registry.len(), "client connected");

        tokio::spawn(connection::handle_connection(
            stream,
            addr,
            registry.clone(),
            store.clone(),
            config.clone(),
        ));
    }
}
