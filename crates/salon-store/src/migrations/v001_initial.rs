//! v001 -- Initial schema creation.
//!
//! One append-only `messages` table holding both chat text and historic
//! file records; file columns are null for plain chat rows.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp      TEXT NOT NULL,               -- ISO-8601 / RFC-3339, UTC
    sender         TEXT NOT NULL,
    content        TEXT,
    kind           INTEGER NOT NULL,            -- wire integer tag
    recipient      TEXT,

    file_id        TEXT,                        -- UUID v4
    file_name      TEXT,
    file_size      INTEGER,
    file_mime_type TEXT
);
"#;

pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
