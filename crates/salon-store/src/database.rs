//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] behind a mutex
//! and guarantees that migrations are run before any other operation. The
//! mutex is the store's internal serialization: many connection tasks may
//! hold one shared `Database` and call into it concurrently.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;

use crate::error::Result;
use crate::migrations;

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database file at the given path.
    ///
    /// Parent directories are created if missing.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::info!(path = %path.display(), "opening history database");

        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open a transient in-memory database (tests and ephemeral runs).
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        // Recommended SQLite settings.
        conn.pragma_update(None, "journal_mode", "WAL")?;

        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the underlying connection.
    ///
    /// A poisoned lock is recovered rather than propagated: SQLite state is
    /// consistent per statement, and history writes are single-row inserts.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the filesystem path of the open database (if file-backed).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn().path().map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let db = Database::open_at(&path).expect("should open");
        assert!(db.path().is_some());
    }

    #[test]
    fn open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        drop(Database::open_at(&path).unwrap());
        // Re-opening runs migrations again; they must be guarded.
        Database::open_at(&path).expect("second open should succeed");
    }
}
