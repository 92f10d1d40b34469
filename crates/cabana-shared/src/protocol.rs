//! JSON wire protocol spoken over the websocket, one event per text frame.
//!
//! Both directions are closed tagged unions; adding an event type extends the
//! matching enum and every dispatch site is checked at compile time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{Channel, ChannelId, ChatMessage, MessageId, OnlineUser, UserId};

/// Events sent from a client to the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Join a channel, leaving the previous one (if any).
    #[serde(rename = "channel:join", rename_all = "camelCase")]
    ChannelJoin { channel_id: ChannelId },

    /// Announce a freshly persisted message for redistribution. Carries only
    /// the id; the server re-reads the authoritative row before broadcasting.
    #[serde(rename = "message:new", rename_all = "camelCase")]
    MessageNew {
        channel_id: ChannelId,
        message_id: MessageId,
    },

    #[serde(rename = "typing:start")]
    TypingStart,

    #[serde(rename = "typing:stop")]
    TypingStop,
}

/// Events pushed from the server to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A new message in the given channel, carrying the full durable row.
    #[serde(rename = "message:new", rename_all = "camelCase")]
    MessageNew {
        channel_id: ChannelId,
        message: ChatMessage,
    },

    /// Fresh presence snapshot for the channel the receiver is in.
    #[serde(rename = "presence:update")]
    PresenceUpdate { users: Vec<OnlineUser> },

    /// Distinct-user occupancy per channel, sent to every connection.
    #[serde(rename = "channel:counts")]
    ChannelCounts { counts: HashMap<ChannelId, usize> },

    #[serde(rename = "typing:start", rename_all = "camelCase")]
    TypingStart { user_id: UserId, username: String },

    #[serde(rename = "typing:stop", rename_all = "camelCase")]
    TypingStop { user_id: UserId },

    #[serde(rename = "user:joined")]
    UserJoined { username: String },

    #[serde(rename = "user:left")]
    UserLeft { username: String },

    #[serde(rename = "channel:created")]
    ChannelCreated { channel: Channel },

    #[serde(rename = "channel:deleted", rename_all = "camelCase")]
    ChannelDeleted { channel_id: ChannelId },
}

impl ClientEvent {
    /// Serialize to a JSON frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from a JSON frame.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl ServerEvent {
    /// Serialize to a JSON frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from a JSON frame.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
