//! Presence aggregation derived from live connection state.
//!
//! There is no durable source of truth for presence: both snapshots are
//! recomputed from current registry contents on every call, never cached, so
//! no drift is possible. The O(connections) scan is the accepted cost.

use std::collections::{HashMap, HashSet};

use cabana_shared::types::{ChannelId, OnlineUser, UserId};

use crate::registry::ConnectionRegistry;

/// Distinct users with at least one live connection joined to `channel`, in
/// first-seen connection order. A user with two simultaneous connections in
/// the channel appears once.
pub fn online_users(registry: &ConnectionRegistry, channel: ChannelId) -> Vec<OnlineUser> {
    let mut seen: HashSet<UserId> = HashSet::new();
    let mut users = Vec::new();

    for conn in registry.iter() {
        if conn.channel != Some(channel) {
            continue;
        }
        if seen.insert(conn.identity.user_id) {
            users.push(OnlineUser {
                user_id: conn.identity.user_id,
                username: conn.identity.username.clone(),
            });
        }
    }

    users
}

/// Per-channel count of distinct users with at least one live connection
/// joined to that channel. Connections with no channel are excluded.
pub fn channel_counts(registry: &ConnectionRegistry) -> HashMap<ChannelId, usize> {
    let mut users_by_channel: HashMap<ChannelId, HashSet<UserId>> = HashMap::new();

    for conn in registry.iter() {
        if let Some(channel) = conn.channel {
            users_by_channel
                .entry(channel)
                .or_default()
                .insert(conn.identity.user_id);
        }
    }

    users_by_channel
        .into_iter()
        .map(|(channel, users)| (channel, users.len()))
        .collect()
}

#[cfg(test)]
mod tests {
    use cabana_shared::types::Identity;
    use tokio::sync::mpsc;

    use super::*;
    use crate::registry::ConnectionId;

    fn connect(registry: &mut ConnectionRegistry, user: i64, name: &str) -> ConnectionId {
        let (tx, rx) = mpsc::unbounded_channel();
        std::mem::forget(rx);
        registry.register(
            Identity {
                user_id: UserId(user),
                username: name.to_string(),
            },
            tx,
        )
    }

    #[test]
    fn test_online_users_dedups_by_user_id() {
        let mut registry = ConnectionRegistry::new();
        let a1 = connect(&mut registry, 1, "ada");
        let b = connect(&mut registry, 2, "brian");
        let a2 = connect(&mut registry, 1, "ada");

        registry.set_channel(a1, ChannelId(1));
        registry.set_channel(b, ChannelId(1));
        registry.set_channel(a2, ChannelId(1));

        let users = online_users(&registry, ChannelId(1));
        assert_eq!(
            users,
            vec![
                OnlineUser {
                    user_id: UserId(1),
                    username: "ada".into()
                },
                OnlineUser {
                    user_id: UserId(2),
                    username: "brian".into()
                },
            ]
        );
    }

    #[test]
    fn test_online_users_scoped_to_channel() {
        let mut registry = ConnectionRegistry::new();
        let a = connect(&mut registry, 1, "ada");
        let b = connect(&mut registry, 2, "brian");

        registry.set_channel(a, ChannelId(1));
        registry.set_channel(b, ChannelId(2));

        let users = online_users(&registry, ChannelId(1));
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id, UserId(1));
    }

    #[test]
    fn test_counts_distinct_users_and_skip_channelless() {
        let mut registry = ConnectionRegistry::new();
        let a1 = connect(&mut registry, 1, "ada");
        let a2 = connect(&mut registry, 1, "ada");
        let b = connect(&mut registry, 2, "brian");
        let _idle = connect(&mut registry, 3, "carol");

        registry.set_channel(a1, ChannelId(1));
        registry.set_channel(a2, ChannelId(1));
        registry.set_channel(b, ChannelId(2));

        let counts = channel_counts(&registry);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&ChannelId(1)], 1);
        assert_eq!(counts[&ChannelId(2)], 1);
    }

    #[test]
    fn test_empty_registry_counts() {
        let registry = ConnectionRegistry::new();
        assert!(channel_counts(&registry).is_empty());
        assert!(online_users(&registry, ChannelId(1)).is_empty());
    }
}
