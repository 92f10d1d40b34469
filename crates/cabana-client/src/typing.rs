//! Self-expiring view of who is typing in the active channel.
//!
//! The server broadcasts `typing:stop` on expiry, but a dropped frame would
//! otherwise leave an indicator stuck forever; every entry therefore carries
//! its own deadline and is swept on read. Switching channels clears the
//! whole view.

use std::time::Instant;

use cabana_shared::constants::TYPING_EXPIRY;
use cabana_shared::types::UserId;

struct TypingEntry {
    user_id: UserId,
    username: String,
    deadline: Instant,
}

/// Users currently marked as typing, in the order they started.
#[derive(Default)]
pub struct TypingView {
    entries: Vec<TypingEntry>,
}

impl TypingView {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Record a typing signal, re-arming the user's deadline if they were
    /// already marked.
    pub fn start(&mut self, user_id: UserId, username: String, now: Instant) {
        let deadline = now + TYPING_EXPIRY;

        if let Some(entry) = self.entries.iter_mut().find(|e| e.user_id == user_id) {
            entry.deadline = deadline;
            entry.username = username;
            return;
        }

        self.entries.push(TypingEntry {
            user_id,
            username,
            deadline,
        });
    }

    /// Clear a user's typing signal.
    pub fn stop(&mut self, user_id: UserId) {
        self.entries.retain(|e| e.user_id != user_id);
    }

    /// Drop entries whose quiet period has elapsed.
    pub fn remove_expired(&mut self, now: Instant) {
        self.entries.retain(|e| e.deadline > now);
    }

    /// Clear everything (channel switch, disconnect).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Usernames currently typing, sweeping expired entries first.
    pub fn typing_users(&mut self, now: Instant) -> Vec<&str> {
        self.remove_expired(now);
        self.entries.iter().map(|e| e.username.as_str()).collect()
    }
}
