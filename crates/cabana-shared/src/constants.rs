use std::time::Duration;

/// Name of the reserved channel that always exists and can never be deleted.
pub const DEFAULT_CHANNEL_NAME: &str = "general";

/// Quiet period after which an active typing indicator auto-expires.
pub const TYPING_EXPIRY: Duration = Duration::from_secs(3);

/// Fixed delay before the client transport attempts to reconnect after an
/// unexpected close.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Number of recent messages returned by a history fetch.
pub const MESSAGE_HISTORY_LIMIT: u32 = 50;

/// Websocket close code sent when a connection fails identity verification.
pub const CLOSE_UNAUTHORIZED: u16 = 4001;

/// User id used for client-side system notices ("x joined the chat").
/// Never present in the users table.
pub const SYSTEM_USER_ID: i64 = 0;

/// Channel name length bounds, applied after trimming.
pub const CHANNEL_NAME_MIN: usize = 1;
pub const CHANNEL_NAME_MAX: usize = 20;

/// Message content length bounds, applied after trimming.
pub const MESSAGE_CONTENT_MIN: usize = 1;
pub const MESSAGE_CONTENT_MAX: usize = 2000;

/// Default HTTP/websocket listen port for the server.
pub const DEFAULT_HTTP_PORT: u16 = 3002;
