//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the relay can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use salon_shared::constants::{DEFAULT_PORT, HISTORY_REPLAY_LIMIT};

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address the TCP listener binds to.
    /// Env: `LISTEN_ADDR`
    /// Default: `0.0.0.0:12345`
    pub listen_addr: SocketAddr,

    /// Filesystem path of the history database.
    /// Env: `DB_PATH`
    /// Default: `./chat_history.db`
    pub db_path: PathBuf,

    /// How many historic messages are replayed to a new client.
    /// Env: `HISTORY_LIMIT`
    /// Default: `50`
    pub history_limit: u32,

    /// Bounded per-connection outbox depth; frames beyond it are dropped
    /// (best-effort delivery).
    /// Env: `OUTBOX_CAPACITY`
    /// Default: `256`
    pub outbox_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([0, 0, 0, 0], DEFAULT_PORT).into(),
            db_path: PathBuf::from("./chat_history.db"),
            history_limit: HISTORY_REPLAY_LIMIT,
            outbox_capacity: 256,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("LISTEN_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.listen_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid LISTEN_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Ok(val) = std::env::var("HISTORY_LIMIT") {
            if let Ok(n) = val.parse::<u32>() {
                config.history_limit = n;
            } else {
                tracing::warn!(value = %val, "Invalid HISTORY_LIMIT, using default");
            }
        }

        if let Ok(val) = std::env::var("OUTBOX_CAPACITY") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.outbox_capacity = n,
                _ => tracing::warn!(value = %val, "Invalid OUTBOX_CAPACITY, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so it is not stored here.

        config
    }
}
