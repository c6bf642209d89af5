//! Append and replay of the message log.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use salon_shared::constants::SERVER_SENDER;
use salon_shared::{Message, MessageKind};

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Append one record to the history log.
    pub fn save(&self, message: &Message) -> Result<()> {
        self.conn().execute(
            "INSERT INTO messages
                 (timestamp, sender, content, kind, recipient,
                  file_id, file_name, file_size, file_mime_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                message.timestamp.to_rfc3339(),
                message.sender.as_deref().unwrap_or(SERVER_SENDER),
                message.content,
                message.kind as u8,
                message.recipient,
                // The nil UUID means "no file"; stored as NULL.
                (!message.file_id.is_nil()).then(|| message.file_id.to_string()),
                message.file_name,
                // Zero means "no file"; stored as NULL like the rest of the
                // file columns.
                (message.file_size > 0).then_some(message.file_size as i64),
                message.file_mime_type,
            ],
        )?;
        Ok(())
    }

    /// Up to `limit` most recent records, oldest first.
    ///
    /// Insertion order (rowid), not timestamp order, defines chronology, so
    /// replay matches the order the relay processed the messages in.
    pub fn get_recent(&self, limit: u32) -> Result<Vec<Message>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT timestamp, sender, content, kind, recipient,
                    file_id, file_name, file_size, file_mime_type
             FROM (SELECT * FROM messages ORDER BY id DESC LIMIT ?1)
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![limit], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let ts_str: String = row.get(0)?;
    let sender: String = row.get(1)?;
    let content: Option<String> = row.get(2)?;
    let kind_tag: u8 = row.get(3)?;
    let recipient: Option<String> = row.get(4)?;
    let file_id_str: Option<String> = row.get(5)?;
    let file_name: Option<String> = row.get(6)?;
    let file_size: Option<i64> = row.get(7)?;
    let file_mime_type: Option<String> = row.get(8)?;

    let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let kind = MessageKind::try_from(kind_tag).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Integer, Box::new(e))
    })?;

    let file_id = match file_id_str {
        Some(s) => Uuid::parse_str(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?,
        None => Uuid::nil(),
    };

    let mut msg = Message::new(kind);
    msg.sender = Some(sender);
    msg.content = content;
    msg.timestamp = timestamp;
    msg.recipient = recipient;
    msg.file_id = file_id;
    msg.file_name = file_name;
    msg.file_size = file_size.unwrap_or(0) as u64;
    msg.file_mime_type = file_mime_type;
    Ok(msg)
}
