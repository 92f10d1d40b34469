//! Websocket endpoint: handshake, frame dispatch, and disconnect handling.
//!
//! A socket is admitted only with a verified identity; anything else is
//! closed with the distinguishable unauthorized code before any message is
//! processed. Each admitted connection gets a writer task fed by the
//! registry's outbound queue, while this task runs the read loop.

use std::collections::HashMap;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use cabana_shared::constants::CLOSE_UNAUTHORIZED;
use cabana_shared::protocol::ClientEvent;
use cabana_shared::types::Identity;

use crate::api::AppState;
use crate::auth;
use crate::registry::ConnectionId;

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let identity = auth::identity_from_headers(&headers, &state.config.jwt_secret).or_else(|| {
        params
            .get("token")
            .and_then(|token| auth::verify_token(token, &state.config.jwt_secret))
    });

    ws.on_upgrade(move |socket| handle_socket(state, socket, identity))
}

async fn handle_socket(state: AppState, mut socket: WebSocket, identity: Option<Identity>) {
    let Some(identity) = identity else {
        // No connection object is created for an unauthenticated handshake.
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: CLOSE_UNAUTHORIZED,
                reason: "Unauthorized".into(),
            })))
            .await;
        return;
    };

    info!(user = %identity.user_id, "websocket connected");

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let conn = state.hub.register(identity.clone(), tx);

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                debug!(conn = %conn, error = %e, "websocket read error");
                break;
            }
        };

        match frame {
            Message::Text(raw) => {
                // One unparseable frame never takes the connection down.
                let event = match ClientEvent::from_json(&raw) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(conn = %conn, error = %e, "failed to parse client frame");
                        continue;
                    }
                };
                dispatch(&state, conn, event).await;
            }
            Message::Close(_) => break,
            // Ping/pong are handled by the protocol layer; binary frames
            // are not part of the protocol.
            _ => {}
        }
    }

    info!(user = %identity.user_id, "websocket disconnected");
    state.hub.handle_disconnect(conn);
    writer.abort();
}

async fn dispatch(state: &AppState, conn: ConnectionId, event: ClientEvent) {
    match event {
        ClientEvent::ChannelJoin { channel_id } => state.hub.handle_join(conn, channel_id),
        ClientEvent::MessageNew {
            channel_id,
            message_id,
        } => {
            state
                .hub
                .relay_new_message(conn, channel_id, message_id)
                .await
        }
        ClientEvent::TypingStart => state.hub.handle_typing_start(conn),
        ClientEvent::TypingStop => state.hub.handle_typing_stop(conn),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cabana_shared::protocol::ServerEvent;
    use cabana_shared::types::{ChannelId, UserId};
    use cabana_store::Database;
    use futures::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite;

    use super::*;
    use crate::api::{build_router, AppState};
    use crate::config::ServerConfig;
    use crate::hub::ChatHub;
    use crate::store::SharedStore;

    async fn start_test_server() -> (String, Arc<ServerConfig>) {
        let config = Arc::new(ServerConfig::default());
        let store = SharedStore::new(Database::open_in_memory().unwrap());
        let state = AppState {
            hub: ChatHub::new(store.clone()),
            store,
            config: Arc::clone(&config),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });

        (format!("ws://{addr}/ws"), config)
    }

    #[tokio::test]
    async fn test_unauthenticated_socket_closed_with_policy_code() {
        let (url, _config) = start_test_server().await;

        let (mut socket, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

        let frame = socket.next().await.unwrap().unwrap();
        match frame {
            tungstenite::Message::Close(Some(close)) => {
                assert_eq!(u16::from(close.code), CLOSE_UNAUTHORIZED);
            }
            other => panic!("expected close frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_authenticated_join_produces_presence_and_counts() {
        let (url, config) = start_test_server().await;

        let identity = Identity {
            user_id: UserId(1),
            username: "ada".into(),
        };
        let token = auth::sign_token(&identity, &config.jwt_secret).unwrap();

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("{url}?token={token}"))
            .await
            .unwrap();

        let join = ClientEvent::ChannelJoin {
            channel_id: ChannelId(1),
        };
        socket
            .send(tungstenite::Message::Text(join.to_json().unwrap()))
            .await
            .unwrap();

        let first = socket.next().await.unwrap().unwrap();
        let event = ServerEvent::from_json(first.to_text().unwrap()).unwrap();
        match event {
            ServerEvent::PresenceUpdate { users } => {
                assert_eq!(users.len(), 1);
                assert_eq!(users[0].username, "ada");
            }
            other => panic!("expected presence update, got {other:?}"),
        }

        let second = socket.next().await.unwrap().unwrap();
        let event = ServerEvent::from_json(second.to_text().unwrap()).unwrap();
        match event {
            ServerEvent::ChannelCounts { counts } => {
                assert_eq!(counts.get(&ChannelId(1)), Some(&1));
            }
            other => panic!("expected channel counts, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_frame_does_not_kill_connection() {
        let (url, config) = start_test_server().await;

        let identity = Identity {
            user_id: UserId(1),
            username: "ada".into(),
        };
        let token = auth::sign_token(&identity, &config.jwt_secret).unwrap();

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("{url}?token={token}"))
            .await
            .unwrap();

        socket
            .send(tungstenite::Message::Text("not json".into()))
            .await
            .unwrap();

        // The connection survives and still processes the join that follows.
        let join = ClientEvent::ChannelJoin {
            channel_id: ChannelId(1),
        };
        socket
            .send(tungstenite::Message::Text(join.to_json().unwrap()))
            .await
            .unwrap();

        let first = socket.next().await.unwrap().unwrap();
        let event = ServerEvent::from_json(first.to_text().unwrap()).unwrap();
        assert!(matches!(event, ServerEvent::PresenceUpdate { .. }));
    }
}
