/// Application name
pub const APP_NAME: &str = "Salon";

/// Default TCP listen port for the relay
pub const DEFAULT_PORT: u16 = 12345;

/// Sender name stamped on server-originated messages
pub const SERVER_SENDER: &str = "Server";

/// Placeholder nickname for connections that have not completed the handshake
pub const UNSET_NICKNAME: &str = "UnknownUser";

/// How many historic messages are replayed to a newly connected client
pub const HISTORY_REPLAY_LIMIT: u32 = 50;

/// File transfer chunk size in bytes (64 KiB of raw file data per chunk)
pub const FILE_CHUNK_SIZE: usize = 64 * 1024;

/// AES-256 key size in bytes
pub const CIPHER_KEY_SIZE: usize = 32;

/// AES block / IV size in bytes
pub const CIPHER_IV_SIZE: usize = 16;

/// Shared symmetric key baked into both peers.
///
/// A hardcoded key is explicitly a placeholder, not a security boundary;
/// existing clients carry the same constant, so changing it breaks interop.
pub const CIPHER_KEY: &[u8; CIPHER_KEY_SIZE] = b"MySuperSecretKeyForChatApp123456";

/// Fixed CBC initialization vector, shared with clients.
///
/// The IV is not transmitted on the wire. Identical plaintext prefixes
/// therefore produce identical ciphertext prefixes across messages; a real
/// deployment must replace this with per-session key exchange.
pub const CIPHER_IV: &[u8; CIPHER_IV_SIZE] = b"MyIVForAES123456";
