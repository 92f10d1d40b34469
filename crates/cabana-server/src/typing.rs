//! Per-connection typing state with auto-expiry timers.
//!
//! Each actively typing connection owns one single-shot expiry timer stored
//! as an explicit handle, re-armed on every repeated start (debounce) and
//! cancelled unconditionally on stop, channel switch, or disconnect.
//! Dropping an entry aborts its timer, so teardown is a single sweep.

use std::collections::HashMap;

use cabana_shared::types::{ChannelId, UserId};
use tokio::task::JoinHandle;

use crate::registry::ConnectionId;

/// One active typing signal.
struct TypingEntry {
    channel: ChannelId,
    user_id: UserId,
    timer: JoinHandle<()>,
}

impl Drop for TypingEntry {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

/// Tracks which connections are currently marked as typing.
#[derive(Default)]
pub struct TypingTracker {
    entries: HashMap<ConnectionId, TypingEntry>,
}

impl TypingTracker {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Channel the connection is currently typing in, if any.
    pub fn active_channel(&self, conn: ConnectionId) -> Option<ChannelId> {
        self.entries.get(&conn).map(|e| e.channel)
    }

    /// Record a typing signal and (re)arm its expiry timer. A previous timer
    /// for the connection is aborted; each re-arm resets the full quiet
    /// period.
    pub fn arm(
        &mut self,
        conn: ConnectionId,
        channel: ChannelId,
        user_id: UserId,
        timer: JoinHandle<()>,
    ) {
        self.entries.insert(
            conn,
            TypingEntry {
                channel,
                user_id,
                timer,
            },
        );
    }

    /// Clear the connection's typing state, aborting any pending timer.
    /// Returns the channel and user of the cleared signal.
    pub fn cancel(&mut self, conn: ConnectionId) -> Option<(ChannelId, UserId)> {
        self.entries
            .remove(&conn)
            .map(|entry| (entry.channel, entry.user_id))
    }

    /// Whether any connection is currently marked typing (tests).
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConnectionRegistry;
    use cabana_shared::types::Identity;

    fn test_conn() -> ConnectionId {
        // ConnectionId construction is private; go through a registry.
        let mut registry = ConnectionRegistry::new();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        std::mem::forget(rx);
        registry.register(
            Identity {
                user_id: UserId(1),
                username: "ada".into(),
            },
            tx,
        )
    }

    #[tokio::test]
    async fn test_arm_replaces_previous_timer() {
        let mut tracker = TypingTracker::new();
        let conn = test_conn();

        let first = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        });
        tracker.arm(conn, ChannelId(1), UserId(1), first);

        let second = tokio::spawn(async {});
        tracker.arm(conn, ChannelId(1), UserId(1), second);

        assert_eq!(tracker.active_channel(conn), Some(ChannelId(1)));
        assert_eq!(tracker.cancel(conn), Some((ChannelId(1), UserId(1))));
        assert!(tracker.is_empty());
        assert_eq!(tracker.cancel(conn), None);
    }
}
