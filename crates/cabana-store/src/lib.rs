//! # cabana-store
//!
//! Durable storage for the Cabana chat server, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for users,
//! channels, and messages. The real-time layer consumes these helpers as its
//! persistence collaborator; it never touches SQL itself.

pub mod channels;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
