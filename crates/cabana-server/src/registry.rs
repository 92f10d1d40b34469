//! Connection registry and channel membership.
//!
//! Tracks every live authenticated websocket and the channel it is currently
//! joined to. The registry is pure bookkeeping: it performs no fan-out itself
//! and is queried by the broadcast engine and the presence aggregator.
//!
//! Connections are kept in insertion order so presence snapshots list users
//! in first-seen order.

use cabana_shared::types::{ChannelId, Identity};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identifier of one live connection. Ephemeral; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One live authenticated connection.
///
/// Owned exclusively by the registry for its lifetime; created on successful
/// handshake, removed when the transport closes.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    /// Verified identity, immutable for the connection's lifetime.
    pub identity: Identity,
    /// Channel the connection has joined. `None` until a join is processed;
    /// no implicit channel is assigned at connection time.
    pub channel: Option<ChannelId>,
    /// Outbound frame queue consumed by the connection's writer task.
    tx: mpsc::UnboundedSender<String>,
}

impl Connection {
    /// Push a serialized frame onto the connection's outbound queue.
    ///
    /// Returns `false` when the writer side is gone (dead connection); the
    /// caller skips it and carries on with the fan-out.
    pub fn send_frame(&self, payload: String) -> bool {
        self.tx.send(payload).is_ok()
    }
}

/// Tracks all currently connected, authenticated sockets.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Vec<Connection>,
}

impl ConnectionRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            connections: Vec::new(),
        }
    }

    /// Record a newly authenticated connection and return its id.
    pub fn register(&mut self, identity: Identity, tx: mpsc::UnboundedSender<String>) -> ConnectionId {
        let id = ConnectionId::new();

        tracing::debug!(conn = %id, user = %identity.user_id, "registering connection");

        self.connections.push(Connection {
            id,
            identity,
            channel: None,
            tx,
        });
        id
    }

    /// Remove a connection, returning it so the caller can run the
    /// disconnect protocol against its last channel.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Connection> {
        let index = self.connections.iter().position(|c| c.id == id)?;
        tracing::debug!(conn = %id, "removing connection");
        Some(self.connections.remove(index))
    }

    /// Record the connection's new channel and return the previous one, so
    /// the caller can notify the vacated channel. Returns `None` when the
    /// connection is unknown.
    pub fn set_channel(
        &mut self,
        id: ConnectionId,
        channel: ChannelId,
    ) -> Option<Option<ChannelId>> {
        let conn = self.connections.iter_mut().find(|c| c.id == id)?;
        let previous = conn.channel.replace(channel);
        Some(previous)
    }

    /// Look up a connection by id.
    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    /// Iterate all live connections in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use cabana_shared::types::UserId;

    use super::*;

    fn test_identity(id: i64, name: &str) -> Identity {
        Identity {
            user_id: UserId(id),
            username: name.to_string(),
        }
    }

    fn test_registry_with_one() -> (ConnectionRegistry, ConnectionId) {
        let mut registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = registry.register(test_identity(1, "ada"), tx);
        (registry, id)
    }

    #[test]
    fn test_register_unregister() {
        let (mut registry, id) = test_registry_with_one();
        assert_eq!(registry.len(), 1);

        let removed = registry.unregister(id).unwrap();
        assert_eq!(removed.identity.username, "ada");
        assert!(registry.is_empty());
        assert!(registry.unregister(id).is_none());
    }

    #[test]
    fn test_no_channel_until_join() {
        let (registry, id) = test_registry_with_one();
        assert_eq!(registry.get(id).unwrap().channel, None);
    }

    #[test]
    fn test_set_channel_returns_previous() {
        let (mut registry, id) = test_registry_with_one();

        assert_eq!(registry.set_channel(id, ChannelId(1)), Some(None));
        assert_eq!(registry.set_channel(id, ChannelId(2)), Some(Some(ChannelId(1))));
        assert_eq!(registry.get(id).unwrap().channel, Some(ChannelId(2)));
    }

    #[test]
    fn test_set_channel_unknown_connection() {
        let (mut registry, id) = test_registry_with_one();
        registry.unregister(id);
        assert_eq!(registry.set_channel(id, ChannelId(1)), None);
    }
}
