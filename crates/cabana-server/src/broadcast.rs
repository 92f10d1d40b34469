//! Broadcast engine: fans a serialized event out to connections matching a
//! predicate.
//!
//! Side effect only. A send to an individual dead connection is swallowed so
//! one broken socket never aborts the remaining fan-out.

use cabana_shared::protocol::ServerEvent;
use cabana_shared::types::ChannelId;
use tracing::{debug, error};

use crate::registry::{ConnectionId, ConnectionRegistry};

/// Send `event` to every live connection currently joined to `channel`,
/// optionally skipping one connection (used to avoid echoing a sender's own
/// typing signal back to itself).
pub fn to_channel(
    registry: &ConnectionRegistry,
    channel: ChannelId,
    event: &ServerEvent,
    exclude: Option<ConnectionId>,
) {
    let payload = match event.to_json() {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, "failed to serialize event, dropping broadcast");
            return;
        }
    };

    for conn in registry.iter() {
        if conn.channel != Some(channel) {
            continue;
        }
        if exclude == Some(conn.id) {
            continue;
        }
        if !conn.send_frame(payload.clone()) {
            debug!(conn = %conn.id, "skipping dead connection during fan-out");
        }
    }
}

/// Send `event` to every live connection regardless of channel (channel
/// lifecycle and global occupancy updates).
pub fn to_all(registry: &ConnectionRegistry, event: &ServerEvent) {
    let payload = match event.to_json() {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, "failed to serialize event, dropping broadcast");
            return;
        }
    };

    for conn in registry.iter() {
        if !conn.send_frame(payload.clone()) {
            debug!(conn = %conn.id, "skipping dead connection during fan-out");
        }
    }
}
