//! Session glue: couples the transport, the REST API client, and the local
//! reconciler into one client-facing surface.
//!
//! The two-path write shape is deliberate: a message is persisted over the
//! request/response path first, and only its id is announced over the live
//! channel so the server can re-validate against the durable row.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use cabana_shared::constants::DEFAULT_CHANNEL_NAME;
use cabana_shared::protocol::{ClientEvent, ServerEvent};
use cabana_shared::types::{Channel, ChannelId, ChatMessage};

use crate::api::ApiClient;
use crate::error::ClientError;
use crate::state::ChatState;
use crate::transport::{ListenerGuard, WsTransport};
use crate::typing::TypingView;

/// One client's connection to a Cabana server.
pub struct ChatSession {
    transport: WsTransport,
    api: ApiClient,
    state: Arc<Mutex<ChatState>>,
    typing: Arc<Mutex<TypingView>>,
}

impl ChatSession {
    /// `server_url` is the HTTP origin, e.g. `http://localhost:3002`;
    /// `token` is the signed identity credential presented at handshake.
    pub fn new(server_url: &str, token: &str) -> Self {
        let base = server_url.trim_end_matches('/');

        Self {
            transport: WsTransport::new(ws_url(base, token)),
            api: ApiClient::new(base, token),
            state: Arc::new(Mutex::new(ChatState::new())),
            typing: Arc::new(Mutex::new(TypingView::new())),
        }
    }

    /// Connect the live channel and start reconciling pushed events into
    /// the local state.
    pub fn start(&self) -> ListenerGuard {
        let state = Arc::clone(&self.state);
        let typing = Arc::clone(&self.typing);

        let guard = self.transport.on_message(move |event| {
            let mut state = state.lock().expect("state mutex poisoned");
            let mut typing = typing.lock().expect("typing mutex poisoned");
            apply_event(&mut state, &mut typing, event);
        });

        self.transport.connect();
        guard
    }

    /// Shared handle to the reconciled state (for rendering).
    pub fn state(&self) -> Arc<Mutex<ChatState>> {
        Arc::clone(&self.state)
    }

    /// Shared handle to the typing view (for rendering).
    pub fn typing(&self) -> Arc<Mutex<TypingView>> {
        Arc::clone(&self.typing)
    }

    /// Fetch the channel list and merge it into the local view.
    pub async fn refresh_channels(&self) -> Result<(), ClientError> {
        let fetched = self.api.channels().await?;
        self.state
            .lock()
            .expect("state mutex poisoned")
            .set_channels(fetched);
        Ok(())
    }

    /// Switch to a channel: announce the join, clear the typing view, and
    /// fetch recent history for the new channel.
    pub async fn join_channel(&self, channel_id: ChannelId) -> Result<(), ClientError> {
        self.state
            .lock()
            .expect("state mutex poisoned")
            .set_channel(Some(channel_id));
        self.typing.lock().expect("typing mutex poisoned").clear();
        self.transport.send(&ClientEvent::ChannelJoin { channel_id });

        let fetched = self.api.messages(channel_id).await;

        let mut state = self.state.lock().expect("state mutex poisoned");
        if state.channel_id() != Some(channel_id) {
            // The fetch lost a race with another switch; drop the stale page.
            return Ok(());
        }

        match fetched {
            Ok(mut page) => {
                // The API returns newest first; the local view is
                // newest-last.
                page.reverse();
                state.set_messages(page);
                state.set_messages_loading(false);
                Ok(())
            }
            Err(e) => {
                state.set_messages_loading(false);
                Err(e)
            }
        }
    }

    /// Persist a message, then announce its id over the live channel.
    pub async fn send_message(&self, content: &str) -> Result<ChatMessage, ClientError> {
        let channel_id = self
            .state
            .lock()
            .expect("state mutex poisoned")
            .channel_id()
            .ok_or(ClientError::NoActiveChannel)?;

        let saved = self.api.send_message(channel_id, content).await?;

        self.transport.send(&ClientEvent::MessageNew {
            channel_id,
            message_id: saved.id,
        });
        self.transport.send(&ClientEvent::TypingStop);

        Ok(saved)
    }

    /// Signal that the local user is typing.
    pub fn notify_typing(&self) {
        self.transport.send(&ClientEvent::TypingStart);
    }

    /// Signal that the local user stopped typing.
    pub fn stop_typing(&self) {
        self.transport.send(&ClientEvent::TypingStop);
    }

    /// Create a channel and add it to the local view eagerly; the broadcast
    /// that follows is deduplicated by id.
    pub async fn create_channel(&self, name: &str) -> Result<Channel, ClientError> {
        let channel = self.api.create_channel(name).await?;
        self.state
            .lock()
            .expect("state mutex poisoned")
            .add_channel(channel.clone());
        Ok(channel)
    }

    /// Delete a channel and remove it from the local view eagerly.
    pub async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), ClientError> {
        self.api.delete_channel(channel_id).await?;
        self.state
            .lock()
            .expect("state mutex poisoned")
            .remove_channel(channel_id);
        Ok(())
    }

    /// Tear the session down; no reconnect will be attempted.
    pub fn shutdown(&self) {
        self.transport.disconnect();
        self.typing.lock().expect("typing mutex poisoned").clear();
    }
}

/// Apply one pushed event to the local state.
///
/// Kept free-standing so the reconciliation rules are testable without a
/// live transport.
pub fn apply_event(state: &mut ChatState, typing: &mut TypingView, event: &ServerEvent) {
    match event {
        ServerEvent::MessageNew {
            channel_id,
            message,
        } => {
            // Scoped: a push for another channel never renders into the
            // active one.
            if state.channel_id() == Some(*channel_id) {
                state.add_message(message.clone());
            }
        }

        ServerEvent::PresenceUpdate { users } => {
            state.set_online_users(users.clone());
        }

        ServerEvent::ChannelCounts { counts } => {
            state.set_channel_counts(counts.clone());
        }

        ServerEvent::ChannelCreated { channel } => {
            state.add_channel(channel.clone());
        }

        ServerEvent::ChannelDeleted { channel_id } => {
            let deleted_name = state
                .find_channel(*channel_id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| format!("#{channel_id}"));
            let was_active = state.channel_id() == Some(*channel_id);

            state.remove_channel(*channel_id);

            // The server only announces the deletion; moving off the dead
            // channel is this client's responsibility.
            if was_active {
                let reserved = state
                    .find_channel_by_name(DEFAULT_CHANNEL_NAME)
                    .map(|c| c.id);
                if let Some(reserved_id) = reserved {
                    state.set_channel(Some(reserved_id));
                    state.add_system_message(format!(
                        "You were moved from channel: {deleted_name} because it was removed"
                    ));
                }
            }
        }

        ServerEvent::TypingStart { user_id, username } => {
            typing.start(*user_id, username.clone(), Instant::now());
        }

        ServerEvent::TypingStop { user_id } => {
            typing.stop(*user_id);
        }

        ServerEvent::UserJoined { username } => {
            state.add_system_message(format!("{username} has joined the chat"));
        }

        ServerEvent::UserLeft { username } => {
            state.add_system_message(format!("{username} has left the channel"));
        }
    }
}

/// Derive the websocket endpoint from the HTTP origin.
fn ws_url(base: &str, token: &str) -> String {
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };

    format!("{ws_base}/ws?token={token}")
}
