use thiserror::Error;

/// Errors from the cipher envelope.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Malformed base64, bad padding, or corrupt ciphertext. Callers must
    /// treat this as recoverable for a single frame, never fatal to the
    /// whole connection (except on the handshake frame).
    #[error("Decryption failed: invalid token or corrupt ciphertext")]
    DecryptionFailed,

    /// Decrypted bytes were not valid UTF-8.
    #[error("Decrypted payload is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors from message serialization and envelope handling.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A kind tag outside the closed enum (e.g. read back from storage).
    #[error("Unknown message kind tag: {0}")]
    UnknownKind(u8),

    /// Chunk `fileData` payload was not valid base64.
    #[error("Invalid chunk payload: not valid base64")]
    ChunkDecode,
}
