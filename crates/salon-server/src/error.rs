use thiserror::Error;

/// Top-level server errors; per-connection faults never surface here.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listener-level I/O failure (bind or accept).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// History store failure during startup.
    #[error("Store error: {0}")]
    Store(#[from] salon_store::StoreError),
}
