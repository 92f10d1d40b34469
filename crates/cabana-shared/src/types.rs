use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Durable row identifiers are sqlite rowids; newtypes keep them from being
// mixed up at call sites.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub i64);

// ChannelId doubles as a JSON map key in the `channel:counts` event, where
// keys arrive as strings ("3" rather than 3). Accept both spellings.
impl<'de> serde::Deserialize<'de> for ChannelId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ChannelIdVisitor;

        impl serde::de::Visitor<'_> for ChannelIdVisitor {
            type Value = ChannelId;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a channel id as an integer or numeric string")
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<ChannelId, E> {
                Ok(ChannelId(v))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<ChannelId, E> {
                i64::try_from(v)
                    .map(ChannelId)
                    .map_err(|_| E::custom("channel id out of range"))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<ChannelId, E> {
                v.parse::<i64>()
                    .map(ChannelId)
                    .map_err(|_| E::custom("channel id is not a number"))
            }
        }

        deserializer.deserialize_any(ChannelIdVisitor)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Verified identity attached to a live connection at handshake time.
///
/// Resolved once from the auth token and immutable for the connection's
/// lifetime; the server never accepts author information from the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
}

/// A durable channel record as it appears on the wire and in fetches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    /// `None` for channels seeded by the system (the reserved channel).
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// A message joined with its author's username, the shape broadcast to
/// channel members and returned by history fetches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub content: String,
    pub username: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// One entry of a presence snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    pub user_id: UserId,
    pub username: String,
}
