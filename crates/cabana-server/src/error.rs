use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cabana_shared::ValidationError;
use cabana_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Channel not found")]
    ChannelNotFound,

    #[error("A channel with that name already exists")]
    DuplicateChannelName,

    #[error("The general channel cannot be deleted")]
    ReservedChannel,

    #[error("Only the channel creator can delete it")]
    NotChannelCreator,

    #[error("Referenced item no longer exists")]
    MissingReference,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::ChannelNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::DuplicateChannelName => (StatusCode::CONFLICT, self.to_string()),
            ServerError::ReservedChannel | ServerError::NotChannelCreator => {
                (StatusCode::FORBIDDEN, self.to_string())
            }
            ServerError::MissingReference => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Store(_) => {
                tracing::error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
