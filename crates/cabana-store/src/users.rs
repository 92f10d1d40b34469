//! CRUD operations for [`User`] records.

use cabana_shared::types::UserId;
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;

impl Database {
    /// Insert a new user. Fails with [`StoreError::Duplicate`] when the
    /// username is already taken.
    pub fn create_user(&self, username: &str) -> Result<User> {
        let created_at = Utc::now();

        self.conn()
            .execute(
                "INSERT INTO users (username, created_at) VALUES (?1, ?2)",
                params![username, created_at.to_rfc3339()],
            )
            .map_err(StoreError::from_insert)?;

        Ok(User {
            id: UserId(self.conn().last_insert_rowid()),
            username: username.to_string(),
            created_at,
        })
    }

    /// Fetch a single user by id.
    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, username, created_at FROM users WHERE id = ?1",
                params![id.0],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`User`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id: i64 = row.get(0)?;
    let username: String = row.get(1)?;
    let created_str: String = row.get(2)?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(User {
        id: UserId(id),
        username,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get_user() {
        let db = Database::open_in_memory().unwrap();

        let user = db.create_user("ada").unwrap();
        let fetched = db.get_user(user.id).unwrap();
        assert_eq!(fetched.username, "ada");
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let db = Database::open_in_memory().unwrap();

        db.create_user("ada").unwrap();
        assert!(matches!(
            db.create_user("ada"),
            Err(StoreError::Duplicate)
        ));
    }

    #[test]
    fn test_get_missing_user() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.get_user(UserId(99)), Err(StoreError::NotFound)));
    }
}
