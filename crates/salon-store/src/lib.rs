//! # salon-store
//!
//! Durable chat history for the Salon relay, backed by SQLite.
//!
//! The store is an append-only log of chat and file events. It exposes a
//! [`Database`] handle that is safe to share across connection tasks: the
//! underlying `rusqlite::Connection` sits behind an internal mutex, so
//! `save` and `get_recent` may be called concurrently.

pub mod database;
pub mod history;
pub mod migrations;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
