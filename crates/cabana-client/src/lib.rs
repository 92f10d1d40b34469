//! # cabana-client
//!
//! Client core for the Cabana chat system: a reconnecting websocket
//! transport with an outbound queue, the local state reconciler that merges
//! fetched snapshots with push events, a self-expiring typing view, the REST
//! API client, and the session glue tying them together.

pub mod api;
pub mod session;
pub mod state;
pub mod transport;
pub mod typing;

mod error;

pub use api::ApiClient;
pub use error::ClientError;
pub use session::ChatSession;
pub use state::ChatState;
pub use transport::{ListenerGuard, WsTransport};
pub use typing::TypingView;
