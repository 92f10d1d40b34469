//! CRUD operations for [`Channel`] records.

use cabana_shared::constants::DEFAULT_CHANNEL_NAME;
use cabana_shared::types::{Channel, ChannelId, UserId};
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new channel. Fails with [`StoreError::Duplicate`] when a
    /// channel with the same name already exists.
    pub fn create_channel(&self, name: &str, created_by: Option<UserId>) -> Result<Channel> {
        let created_at = Utc::now();

        self.conn()
            .execute(
                "INSERT INTO channels (name, created_by, created_at)
                 VALUES (?1, ?2, ?3)",
                params![name, created_by.map(|u| u.0), created_at.to_rfc3339()],
            )
            .map_err(StoreError::from_insert)?;

        Ok(Channel {
            id: ChannelId(self.conn().last_insert_rowid()),
            name: name.to_string(),
            created_by,
            created_at,
        })
    }

    /// Make sure the reserved channel exists. Called once at server startup;
    /// a no-op when it is already present.
    pub fn ensure_default_channel(&self) -> Result<Channel> {
        match self.create_channel(DEFAULT_CHANNEL_NAME, None) {
            Ok(channel) => Ok(channel),
            Err(StoreError::Duplicate) => self.get_channel_by_name(DEFAULT_CHANNEL_NAME),
            Err(e) => Err(e),
        }
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single channel by id.
    pub fn get_channel(&self, id: ChannelId) -> Result<Channel> {
        self.conn()
            .query_row(
                "SELECT id, name, created_by, created_at
                 FROM channels
                 WHERE id = ?1",
                params![id.0],
                row_to_channel,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Fetch a single channel by name.
    pub fn get_channel_by_name(&self, name: &str) -> Result<Channel> {
        self.conn()
            .query_row(
                "SELECT id, name, created_by, created_at
                 FROM channels
                 WHERE name = ?1",
                params![name],
                row_to_channel,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List all channels, oldest first (creation order).
    pub fn list_channels(&self) -> Result<Vec<Channel>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, name, created_by, created_at
             FROM channels
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map([], row_to_channel)?;

        let mut channels = Vec::new();
        for row in rows {
            channels.push(row?);
        }
        Ok(channels)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a channel and all of its messages. Returns `true` if a channel
    /// row was deleted.
    ///
    /// Authorization (creator-only, reserved channel) is the caller's
    /// responsibility; this is plain storage.
    pub fn delete_channel(&self, id: ChannelId) -> Result<bool> {
        self.conn().execute(
            "DELETE FROM messages WHERE channel_id = ?1",
            params![id.0],
        )?;
        let affected = self
            .conn()
            .execute("DELETE FROM channels WHERE id = ?1", params![id.0])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Channel`].
fn row_to_channel(row: &rusqlite::Row<'_>) -> rusqlite::Result<Channel> {
    let id: i64 = row.get(0)?;
    let name: String = row.get(1)?;
    let created_by: Option<i64> = row.get(2)?;
    let created_str: String = row.get(3)?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Channel {
        id: ChannelId(id),
        name,
        created_by: created_by.map(UserId),
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_list_channels() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("ada").unwrap();

        let general = db.ensure_default_channel().unwrap();
        let random = db.create_channel("random", Some(user.id)).unwrap();

        let channels = db.list_channels().unwrap();
        assert_eq!(channels, vec![general, random]);
    }

    #[test]
    fn test_ensure_default_channel_is_idempotent() {
        let db = Database::open_in_memory().unwrap();

        let first = db.ensure_default_channel().unwrap();
        let second = db.ensure_default_channel().unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.name, DEFAULT_CHANNEL_NAME);
        assert_eq!(second.created_by, None);
        assert_eq!(db.list_channels().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_channel_name_rejected() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("ada").unwrap();

        db.create_channel("random", Some(user.id)).unwrap();
        assert!(matches!(
            db.create_channel("random", Some(user.id)),
            Err(StoreError::Duplicate)
        ));
    }

    #[test]
    fn test_delete_channel_cascades_messages() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("ada").unwrap();
        let channel = db.create_channel("random", Some(user.id)).unwrap();
        let message = db.insert_message(channel.id, user.id, "hello").unwrap();

        assert!(db.delete_channel(channel.id).unwrap());
        assert!(db.load_message_with_author(message.id).unwrap().is_none());
        assert!(matches!(db.get_channel(channel.id), Err(StoreError::NotFound)));
    }

    #[test]
    fn test_delete_missing_channel() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.delete_channel(ChannelId(42)).unwrap());
    }
}
