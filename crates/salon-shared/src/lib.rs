//! # salon-shared
//!
//! Wire protocol for the Salon chat relay, shared between the server and
//! any client implementation:
//!
//! - **Message model**: the tagged wire record ([`protocol::Message`]) with
//!   its integer-tagged kind enum, serialized as JSON
//! - **Cipher envelope**: AES-256-CBC + base64 token encoding ([`crypto`])
//! - **Framing**: newline-delimited tokens over a byte stream ([`framing`])
//! - **File chunking**: helpers for splitting and reassembling chunked
//!   file transfers ([`files`])

pub mod constants;
pub mod crypto;
pub mod files;
pub mod framing;
pub mod protocol;

mod error;

pub use error::{CryptoError, ProtocolError};
pub use framing::FrameReader;
pub use protocol::{Message, MessageKind};
