//! Domain model structs persisted in the server database.

use cabana_shared::types::{ChannelId, MessageId, UserId};
use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered user. Credential material lives with the auth collaborator,
/// not here; the store only needs the identity the chat layer displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    /// Unique display name.
    pub username: String,
    pub created_at: DateTime<Utc>,
}

// Channels are stored and served in the same shape they travel on the wire,
// so the store reuses [`cabana_shared::types::Channel`] directly.

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A message row joined with its author's username.
///
/// This is the authoritative shape the relay protocol re-reads before
/// broadcasting; it always carries the channel so the relay can re-validate
/// the announced channel against the durable record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Convert into the wire shape broadcast to channel members. Drops the
    /// channel id, which travels alongside the message in the event envelope.
    pub fn into_chat_message(self) -> cabana_shared::types::ChatMessage {
        cabana_shared::types::ChatMessage {
            id: self.id,
            content: self.content,
            username: self.username,
            user_id: self.user_id,
            created_at: self.created_at,
        }
    }
}
