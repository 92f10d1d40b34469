//! The chat hub: orchestrates the registry, broadcast engine, presence
//! aggregation, typing state, and the message/channel relay protocols.
//!
//! All registry access happens under one mutex with short critical sections.
//! The single await in the relay path (the authoritative message load) is
//! never under the lock; the protocol tolerates a channel switch during the
//! load by re-validating against the loaded row instead.

use std::sync::{Arc, Mutex};

use cabana_shared::constants::TYPING_EXPIRY;
use cabana_shared::protocol::ServerEvent;
use cabana_shared::types::{Channel, ChannelId, Identity, MessageId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::broadcast;
use crate::presence;
use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::store::SharedStore;
use crate::typing::TypingTracker;

pub struct ChatHub {
    registry: Mutex<ConnectionRegistry>,
    typing: Mutex<TypingTracker>,
    store: SharedStore,
}

impl ChatHub {
    pub fn new(store: SharedStore) -> Arc<Self> {
        Arc::new(Self {
            registry: Mutex::new(ConnectionRegistry::new()),
            typing: Mutex::new(TypingTracker::new()),
            store,
        })
    }

    /// Admit an authenticated connection. The caller has already verified
    /// the identity; unauthenticated sockets are closed before this point.
    pub fn register(
        &self,
        identity: Identity,
        tx: mpsc::UnboundedSender<String>,
    ) -> ConnectionId {
        let mut registry = self.registry.lock().expect("registry mutex poisoned");
        registry.register(identity, tx)
    }

    // ------------------------------------------------------------------
    // Channel join
    // ------------------------------------------------------------------

    /// Process a channel join. Event order is part of the contract:
    /// presence-for-old-channel, presence-for-new-channel, joined
    /// notification excluding the joiner, then global occupancy.
    pub fn handle_join(&self, conn: ConnectionId, channel: ChannelId) {
        // A pending typing timer belongs to the vacated channel; cancel it
        // silently and let viewers' own expiry clear the indicator.
        self.typing.lock().expect("typing mutex poisoned").cancel(conn);

        let mut guard = self.registry.lock().expect("registry mutex poisoned");
        let registry = &mut *guard;

        let Some(previous) = registry.set_channel(conn, channel) else {
            return;
        };
        let username = match registry.get(conn) {
            Some(c) => c.identity.username.clone(),
            None => return,
        };

        debug!(conn = %conn, channel = %channel, "channel join");

        if let Some(old) = previous {
            broadcast::to_channel(
                registry,
                old,
                &ServerEvent::PresenceUpdate {
                    users: presence::online_users(registry, old),
                },
                None,
            );
        }

        broadcast::to_channel(
            registry,
            channel,
            &ServerEvent::PresenceUpdate {
                users: presence::online_users(registry, channel),
            },
            None,
        );
        broadcast::to_channel(
            registry,
            channel,
            &ServerEvent::UserJoined { username },
            Some(conn),
        );
        broadcast::to_all(
            registry,
            &ServerEvent::ChannelCounts {
                counts: presence::channel_counts(registry),
            },
        );
    }

    // ------------------------------------------------------------------
    // Message relay
    // ------------------------------------------------------------------

    /// Persist-then-announce relay: the client already stored the message on
    /// the request/response path; the live channel only carries its id. The
    /// authoritative row is re-read and re-validated before redistribution,
    /// so a spoofed announcement is a silent no-op, not an error.
    pub async fn relay_new_message(
        &self,
        conn: ConnectionId,
        channel_id: ChannelId,
        message_id: MessageId,
    ) {
        // A client cannot announce a message into a channel it has not
        // joined.
        {
            let registry = self.registry.lock().expect("registry mutex poisoned");
            match registry.get(conn) {
                Some(c) if c.channel == Some(channel_id) => {}
                _ => return,
            }
        }

        // The only suspension point between validation and broadcast.
        let record = match self.store.load_message_with_author(message_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(e) => {
                warn!(message = %message_id, error = %e, "relay load failed");
                return;
            }
        };

        let registry = self.registry.lock().expect("registry mutex poisoned");
        let Some(connection) = registry.get(conn) else {
            return;
        };

        // The row is authoritative: reject relays of another user's message
        // or into a channel other than the one the row belongs to.
        if record.user_id != connection.identity.user_id {
            return;
        }
        if record.channel_id != channel_id {
            return;
        }

        broadcast::to_channel(
            &registry,
            channel_id,
            &ServerEvent::MessageNew {
                channel_id,
                message: record.into_chat_message(),
            },
            None,
        );
    }

    // ------------------------------------------------------------------
    // Typing
    // ------------------------------------------------------------------

    /// Start (or refresh) the connection's typing signal. The first start of
    /// an active period broadcasts; repeated starts only re-arm the expiry
    /// timer.
    pub fn handle_typing_start(self: &Arc<Self>, conn: ConnectionId) {
        let (channel, identity) = {
            let registry = self.registry.lock().expect("registry mutex poisoned");
            match registry.get(conn) {
                Some(c) => match c.channel {
                    Some(channel) => (channel, c.identity.clone()),
                    // Typing with no channel assigned is a no-op.
                    None => return,
                },
                None => return,
            }
        };

        let already_typing = {
            let mut typing = self.typing.lock().expect("typing mutex poisoned");
            let already = typing.active_channel(conn) == Some(channel);

            let hub = Arc::clone(self);
            let timer = tokio::spawn(async move {
                tokio::time::sleep(TYPING_EXPIRY).await;
                hub.typing_expired(conn);
            });
            typing.arm(conn, channel, identity.user_id, timer);
            already
        };

        if !already_typing {
            let registry = self.registry.lock().expect("registry mutex poisoned");
            broadcast::to_channel(
                &registry,
                channel,
                &ServerEvent::TypingStart {
                    user_id: identity.user_id,
                    username: identity.username,
                },
                Some(conn),
            );
        }
    }

    /// Explicit stop from the client.
    pub fn handle_typing_stop(&self, conn: ConnectionId) {
        self.typing.lock().expect("typing mutex poisoned").cancel(conn);

        let registry = self.registry.lock().expect("registry mutex poisoned");
        let Some(connection) = registry.get(conn) else {
            return;
        };
        let Some(channel) = connection.channel else {
            return;
        };

        broadcast::to_channel(
            &registry,
            channel,
            &ServerEvent::TypingStop {
                user_id: connection.identity.user_id,
            },
            Some(conn),
        );
    }

    /// Quiet-period expiry, invoked by the per-connection timer task.
    fn typing_expired(&self, conn: ConnectionId) {
        let Some((channel, user_id)) = self
            .typing
            .lock()
            .expect("typing mutex poisoned")
            .cancel(conn)
        else {
            // Stopped or disconnected while the timer was firing.
            return;
        };

        let registry = self.registry.lock().expect("registry mutex poisoned");
        broadcast::to_channel(
            &registry,
            channel,
            &ServerEvent::TypingStop { user_id },
            Some(conn),
        );
    }

    // ------------------------------------------------------------------
    // Disconnect
    // ------------------------------------------------------------------

    /// Transport closed. In order: presence update and synthetic typing stop
    /// for the vacated channel (if any), then a global occupancy update.
    pub fn handle_disconnect(&self, conn: ConnectionId) {
        self.typing.lock().expect("typing mutex poisoned").cancel(conn);

        let mut guard = self.registry.lock().expect("registry mutex poisoned");
        let registry = &mut *guard;
        let Some(connection) = registry.unregister(conn) else {
            return;
        };

        info!(user = %connection.identity.user_id, "connection closed");

        if let Some(channel) = connection.channel {
            broadcast::to_channel(
                registry,
                channel,
                &ServerEvent::PresenceUpdate {
                    users: presence::online_users(registry, channel),
                },
                None,
            );
            broadcast::to_channel(
                registry,
                channel,
                &ServerEvent::TypingStop {
                    user_id: connection.identity.user_id,
                },
                None,
            );
        }

        broadcast::to_all(
            registry,
            &ServerEvent::ChannelCounts {
                counts: presence::channel_counts(registry),
            },
        );
    }

    // ------------------------------------------------------------------
    // Channel lifecycle relay
    // ------------------------------------------------------------------

    /// Announce a freshly persisted channel to every connection. Not channel
    /// scoped: users must see new channels before joining them.
    pub fn channel_created(&self, channel: Channel) {
        let registry = self.registry.lock().expect("registry mutex poisoned");
        broadcast::to_all(&registry, &ServerEvent::ChannelCreated { channel });
    }

    /// Announce a channel deletion to every connection. Members redirect
    /// themselves client-side; there is no forced rejoin.
    pub fn channel_deleted(&self, channel_id: ChannelId) {
        let registry = self.registry.lock().expect("registry mutex poisoned");
        broadcast::to_all(&registry, &ServerEvent::ChannelDeleted { channel_id });
    }
}
