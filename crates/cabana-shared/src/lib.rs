//! # cabana-shared
//!
//! Types shared between the Cabana server and client: typed identifiers,
//! the JSON wire protocol spoken over the websocket, input validation
//! rules, and protocol-wide constants.

pub mod constants;
pub mod protocol;
pub mod types;
pub mod validation;

mod error;

pub use error::ValidationError;
pub use protocol::{ClientEvent, ServerEvent};
pub use types::{Channel, ChannelId, ChatMessage, Identity, MessageId, OnlineUser, UserId};
