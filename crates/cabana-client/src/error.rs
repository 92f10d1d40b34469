use thiserror::Error;

/// Errors surfaced to callers of the client API and session layer.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport-level HTTP failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected the request; `message` is the user-facing reason
    /// from the response body.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// An operation that needs an active channel was called without one.
    #[error("No channel selected")]
    NoActiveChannel,
}
