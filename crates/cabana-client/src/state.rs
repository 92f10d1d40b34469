//! Local chat state reconciler.
//!
//! Two independent write paths feed each collection: a periodic full fetch
//! (snapshot) and individual push events. The merge rules keep both from
//! duplicating or losing items: a snapshot retains locally-held items it
//! does not contain (learned via push between fetches), and a push-add is
//! idempotent by id.

use std::collections::{HashMap, HashSet};

use cabana_shared::constants::SYSTEM_USER_ID;
use cabana_shared::types::{Channel, ChannelId, ChatMessage, MessageId, OnlineUser, UserId};
use chrono::Utc;

/// Client-held view of channels, messages, presence, and occupancy.
///
/// Messages are ordered newest-last; channels in fetch order with push-only
/// additions appended.
#[derive(Default)]
pub struct ChatState {
    channel_id: Option<ChannelId>,
    channels: Vec<Channel>,
    messages: Vec<ChatMessage>,
    messages_loading: bool,
    online_users: Vec<OnlineUser>,
    channel_counts: HashMap<ChannelId, usize>,
    system_msg_counter: i64,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn channel_id(&self) -> Option<ChannelId> {
        self.channel_id
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn messages_loading(&self) -> bool {
        self.messages_loading
    }

    pub fn online_users(&self) -> &[OnlineUser] {
        &self.online_users
    }

    pub fn channel_counts(&self) -> &HashMap<ChannelId, usize> {
        &self.channel_counts
    }

    // ------------------------------------------------------------------
    // Channel switching
    // ------------------------------------------------------------------

    /// Switch the active channel. Clears the message collection and flags
    /// loading until the next fetch resolves, so stale messages from the
    /// previous channel never render mixed with the new channel's.
    pub fn set_channel(&mut self, channel_id: Option<ChannelId>) {
        if self.channel_id == channel_id {
            return;
        }
        self.channel_id = channel_id;
        self.messages.clear();
        self.messages_loading = channel_id.is_some();
    }

    pub fn set_messages_loading(&mut self, loading: bool) {
        self.messages_loading = loading;
    }

    // ------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------

    /// Merge a fetched channel snapshot: the snapshot wins, but channels
    /// known only locally (pushed between fetches) are retained after it in
    /// their existing relative order.
    pub fn set_channels(&mut self, fetched: Vec<Channel>) {
        let fetched_ids: HashSet<ChannelId> = fetched.iter().map(|c| c.id).collect();
        let push_only: Vec<Channel> = self
            .channels
            .iter()
            .filter(|c| !fetched_ids.contains(&c.id))
            .cloned()
            .collect();

        self.channels = fetched;
        self.channels.extend(push_only);
    }

    /// Idempotent push-add: ignored when the channel is already known.
    pub fn add_channel(&mut self, channel: Channel) {
        if self.channels.iter().any(|c| c.id == channel.id) {
            return;
        }
        self.channels.push(channel);
    }

    /// Remove a channel. When it was the active one, the active channel and
    /// its messages are cleared; redirecting to the reserved channel is the
    /// caller's decision.
    pub fn remove_channel(&mut self, channel_id: ChannelId) {
        self.channels.retain(|c| c.id != channel_id);
        if self.channel_id == Some(channel_id) {
            self.channel_id = None;
            self.messages.clear();
        }
    }

    pub fn find_channel(&self, channel_id: ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == channel_id)
    }

    pub fn find_channel_by_name(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Merge a fetched message snapshot (newest-last), retaining messages
    /// known only locally so a push arriving between two fetches is not
    /// silently dropped by the next one.
    pub fn set_messages(&mut self, fetched: Vec<ChatMessage>) {
        let fetched_ids: HashSet<MessageId> = fetched.iter().map(|m| m.id).collect();
        let push_only: Vec<ChatMessage> = self
            .messages
            .iter()
            .filter(|m| !fetched_ids.contains(&m.id))
            .cloned()
            .collect();

        self.messages = fetched;
        self.messages.extend(push_only);
    }

    /// Idempotent push-add: appended unless the id is already present.
    pub fn add_message(&mut self, message: ChatMessage) {
        if self.messages.iter().any(|m| m.id == message.id) {
            return;
        }
        self.messages.push(message);
    }

    /// Append a local system notice ("x has joined the chat"). System
    /// messages use negative ids so they can never collide with rows.
    pub fn add_system_message(&mut self, text: impl Into<String>) {
        self.system_msg_counter += 1;
        self.messages.push(ChatMessage {
            id: MessageId(-self.system_msg_counter),
            content: text.into(),
            username: "system".to_string(),
            user_id: UserId(SYSTEM_USER_ID),
            created_at: Utc::now(),
        });
    }

    // ------------------------------------------------------------------
    // Presence
    // ------------------------------------------------------------------

    pub fn set_online_users(&mut self, users: Vec<OnlineUser>) {
        self.online_users = users;
    }

    pub fn set_channel_counts(&mut self, counts: HashMap<ChannelId, usize>) {
        self.channel_counts = counts;
    }
}
