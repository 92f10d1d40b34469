//! CRUD operations for message rows.
//!
//! Reads always join the author's username so the relay and history paths
//! never hand out a message without its display name.

use cabana_shared::types::{ChannelId, MessageId, UserId};
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::MessageRecord;

const SELECT_WITH_AUTHOR: &str = "SELECT m.id, m.channel_id, m.user_id, u.username, m.content, m.created_at
     FROM messages m
     INNER JOIN users u ON u.id = m.user_id";

impl Database {
    /// Insert a new message authored by `user_id` and return the stored row
    /// joined with the author's username.
    ///
    /// The author comes from the verified session identity, never from
    /// client-supplied payload.
    pub fn insert_message(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
        content: &str,
    ) -> Result<MessageRecord> {
        let created_at = Utc::now();

        self.conn().execute(
            "INSERT INTO messages (content, user_id, channel_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![content, user_id.0, channel_id.0, created_at.to_rfc3339()],
        )?;

        let id = MessageId(self.conn().last_insert_rowid());
        let username = self.get_user(user_id)?.username;

        Ok(MessageRecord {
            id,
            channel_id,
            user_id,
            username,
            content: content.to_string(),
            created_at,
        })
    }

    /// Load the authoritative row for a message id, or `None` when it does
    /// not exist (deleted, or never existed).
    pub fn load_message_with_author(&self, id: MessageId) -> Result<Option<MessageRecord>> {
        let sql = format!("{SELECT_WITH_AUTHOR} WHERE m.id = ?1");

        match self
            .conn()
            .query_row(&sql, params![id.0], row_to_message_record)
        {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    /// Fetch the most recent messages of a channel, newest first.
    pub fn messages_for_channel(
        &self,
        channel_id: ChannelId,
        limit: u32,
    ) -> Result<Vec<MessageRecord>> {
        let sql = format!(
            "{SELECT_WITH_AUTHOR}
             WHERE m.channel_id = ?1
             ORDER BY m.created_at DESC, m.id DESC
             LIMIT ?2"
        );

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![channel_id.0, limit], row_to_message_record)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`MessageRecord`].
fn row_to_message_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRecord> {
    let id: i64 = row.get(0)?;
    let channel_id: i64 = row.get(1)?;
    let user_id: i64 = row.get(2)?;
    let username: String = row.get(3)?;
    let content: String = row.get(4)?;
    let created_str: String = row.get(5)?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(MessageRecord {
        id: MessageId(id),
        channel_id: ChannelId(channel_id),
        user_id: UserId(user_id),
        username,
        content,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (Database, UserId, ChannelId) {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("ada").unwrap();
        let channel = db.create_channel("random", Some(user.id)).unwrap();
        (db, user.id, channel.id)
    }

    #[test]
    fn test_insert_joins_author_username() {
        let (db, user_id, channel_id) = seeded();

        let record = db.insert_message(channel_id, user_id, "hello").unwrap();
        assert_eq!(record.username, "ada");
        assert_eq!(record.channel_id, channel_id);

        let loaded = db.load_message_with_author(record.id).unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_load_missing_message_is_none() {
        let (db, _, _) = seeded();
        assert!(db
            .load_message_with_author(MessageId(404))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_history_is_newest_first_and_bounded() {
        let (db, user_id, channel_id) = seeded();

        for i in 0..5 {
            db.insert_message(channel_id, user_id, &format!("m{i}"))
                .unwrap();
        }

        let history = db.messages_for_channel(channel_id, 3).unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m4", "m3", "m2"]);
    }

    #[test]
    fn test_history_is_scoped_to_channel() {
        let (db, user_id, channel_id) = seeded();
        let other = db.create_channel("other", Some(user_id)).unwrap();

        db.insert_message(channel_id, user_id, "here").unwrap();
        db.insert_message(other.id, user_id, "elsewhere").unwrap();

        let history = db.messages_for_channel(channel_id, 50).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "here");
    }
}
