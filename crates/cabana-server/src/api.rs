//! REST API: the request/response path that persists data.
//!
//! Messages and channels are written here and only *announced* over the live
//! connection afterwards. For messages the announcement comes from the
//! client (see the relay protocol); channel lifecycle changes are relayed to
//! all connections directly after the write.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::Method,
    middleware,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use cabana_shared::constants::{DEFAULT_CHANNEL_NAME, MESSAGE_HISTORY_LIMIT};
use cabana_shared::types::{Channel, ChannelId, ChatMessage, Identity};
use cabana_shared::validation;
use cabana_store::StoreError;

use crate::auth::auth_middleware;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::hub::ChatHub;
use crate::store::SharedStore;
use crate::ws;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<ChatHub>,
    pub store: SharedStore,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let api = Router::new()
        .route("/channels", get(list_channels).post(create_channel))
        .route("/channels/:id", delete(delete_channel))
        .route("/channels/:id/messages", get(channel_messages))
        .route("/messages", post(send_message))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(ws::ws_handler))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct CreateChannelRequest {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    channel_id: ChannelId,
    content: String,
}

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_channels(State(state): State<AppState>) -> Result<Json<Vec<Channel>>, ServerError> {
    let channels = state.store.list_channels().await?;
    Ok(Json(channels))
}

async fn create_channel(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<Json<Channel>, ServerError> {
    let name = validation::channel_name(&req.name)?;

    let channel = state
        .store
        .create_channel(name, Some(identity.user_id))
        .await
        .map_err(|e| match e {
            StoreError::Duplicate => ServerError::DuplicateChannelName,
            other => ServerError::Store(other),
        })?;

    tracing::info!(channel = %channel.id, name = %channel.name, "channel created");
    state.hub.channel_created(channel.clone());

    Ok(Json(channel))
}

async fn delete_channel(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Json<OkResponse>, ServerError> {
    let channel_id = ChannelId(id);

    let channel = state.store.get_channel(channel_id).await.map_err(|e| match e {
        StoreError::NotFound => ServerError::ChannelNotFound,
        other => ServerError::Store(other),
    })?;

    if channel.name == DEFAULT_CHANNEL_NAME {
        return Err(ServerError::ReservedChannel);
    }
    if channel.created_by != Some(identity.user_id) {
        return Err(ServerError::NotChannelCreator);
    }

    state.store.delete_channel(channel_id).await?;

    tracing::info!(channel = %channel_id, "channel deleted");
    state.hub.channel_deleted(channel_id);

    Ok(Json(OkResponse { ok: true }))
}

/// Most recent messages of a channel, newest first. The client reverses the
/// page so its local view renders newest-last.
async fn channel_messages(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ChatMessage>>, ServerError> {
    let records = state
        .store
        .messages_for_channel(ChannelId(id), MESSAGE_HISTORY_LIMIT)
        .await?;

    Ok(Json(
        records.into_iter().map(|r| r.into_chat_message()).collect(),
    ))
}

/// Persist a message authored by the verified session identity. The row is
/// not broadcast here: the client announces its id over the live connection
/// and the relay protocol re-reads it.
async fn send_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<ChatMessage>, ServerError> {
    let content = validation::message_content(&req.content)?;

    let record = state
        .store
        .insert_message(req.channel_id, identity.user_id, content)
        .await
        .map_err(|e| match e {
            // Foreign key failure: the channel (or user) vanished between
            // the client's fetch and this write.
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                ServerError::MissingReference
            }
            other => ServerError::Store(other),
        })?;

    Ok(Json(record.into_chat_message()))
}
