//! The tagged wire record exchanged between clients and the relay.
//!
//! One [`Message`] travels as `base64(aes_cbc(json))` + `"\n"`. Field names
//! and the integer kind tags are fixed by the deployed client fleet
//! (camelCase names, enum kinds as JSON integers), so the serde shapes here
//! must not change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use uuid::Uuid;

use crate::crypto;
use crate::error::ProtocolError;

/// Closed set of wire message kinds, exhaustively matched by the relay.
///
/// `PrivateMessage` and `TypingStatus` are reserved by the protocol but the
/// relay does not act on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum MessageKind {
    ChatMessage = 0,
    SystemMessage = 1,
    UserList = 2,
    Disconnect = 3,
    PrivateMessage = 4,
    FileTransferMetadata = 5,
    FileTransferChunk = 6,
    FileTransferEnd = 7,
    HistoricFileMessage = 8,
    TypingStatus = 9,
}

impl TryFrom<u8> for MessageKind {
    type Error = ProtocolError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            0 => MessageKind::ChatMessage,
            1 => MessageKind::SystemMessage,
            2 => MessageKind::UserList,
            3 => MessageKind::Disconnect,
            4 => MessageKind::PrivateMessage,
            5 => MessageKind::FileTransferMetadata,
            6 => MessageKind::FileTransferChunk,
            7 => MessageKind::FileTransferEnd,
            8 => MessageKind::HistoricFileMessage,
            9 => MessageKind::TypingStatus,
            other => return Err(ProtocolError::UnknownKind(other)),
        })
    }
}

/// One wire / persisted message.
///
/// `sender` is never trusted from the client after the handshake: the relay
/// overwrites it with the authenticated nickname before persisting or
/// broadcasting. Only the handshake frame uses the client-supplied value
/// (the claimed nickname becomes the identity).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,

    #[serde(default)]
    pub sender: Option<String>,

    /// Reserved for private messages; the relay never routes by it.
    #[serde(default)]
    pub recipient: Option<String>,

    /// Chat text, comma-joined user list, or human-readable file caption.
    #[serde(default)]
    pub content: Option<String>,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Groups the Metadata -> Chunk(s) -> End frames of one file transfer.
    /// The nil UUID means "no file"; deployed clients expect a non-null
    /// value here, never JSON null.
    #[serde(default)]
    pub file_id: Uuid,

    #[serde(default)]
    pub file_name: Option<String>,

    #[serde(default)]
    pub file_size: u64,

    #[serde(default)]
    pub file_mime_type: Option<String>,

    #[serde(default)]
    pub chunk_index: u32,

    #[serde(default)]
    pub total_chunks: u32,

    /// Base64 payload of one chunk.
    #[serde(default)]
    pub file_data: Option<String>,
}

impl Message {
    /// A message of the given kind with every optional field empty.
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            sender: None,
            recipient: None,
            content: None,
            timestamp: Utc::now(),
            file_id: Uuid::nil(),
            file_name: None,
            file_size: 0,
            file_mime_type: None,
            chunk_index: 0,
            total_chunks: 0,
            file_data: None,
        }
    }

    /// A server-originated system notice.
    pub fn system(content: impl Into<String>) -> Self {
        let mut msg = Self::new(MessageKind::SystemMessage);
        msg.sender = Some(crate::constants::SERVER_SENDER.to_string());
        msg.content = Some(content.into());
        msg
    }

    /// A chat message with the given sender and text.
    pub fn chat(sender: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::new(MessageKind::ChatMessage);
        msg.sender = Some(sender.into());
        msg.content = Some(content.into());
        msg
    }

    /// The handshake frame a client sends to claim a nickname.
    pub fn handshake(nickname: impl Into<String>) -> Self {
        let mut msg = Self::new(MessageKind::SystemMessage);
        msg.sender = Some(nickname.into());
        msg
    }

    /// A user-list snapshot; `content` is the names joined by commas.
    pub fn user_list(names: &[String]) -> Self {
        let mut msg = Self::new(MessageKind::UserList);
        msg.sender = Some(crate::constants::SERVER_SENDER.to_string());
        msg.content = Some(names.join(","));
        msg
    }

    /// A graceful-close signal.
    pub fn disconnect() -> Self {
        Self::new(MessageKind::Disconnect)
    }

    /// Serialize to the JSON wire shape.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from the JSON wire shape.
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize, encrypt, and base64-encode into one frame token
    /// (without the trailing newline delimiter).
    pub fn seal(&self) -> Result<String, ProtocolError> {
        Ok(crypto::encrypt(&self.to_json()?))
    }

    /// Decrypt and deserialize one frame token.
    pub fn open(token: &str) -> Result<Self, ProtocolError> {
        Self::from_json(&crypto::decrypt(token)?)
    }
}
