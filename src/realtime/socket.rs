use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;
use crate::middleware::auth::authenticate;
use crate::realtime::relay::{Frame, Relay, CONNECTION_CHANNEL_BUFFER};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SocketQuery {
    pub token: Option<String>,
}

/// `GET /socket`: upgrade to a session socket
///
/// A `token` query parameter is verified when present; anonymous sockets
/// are allowed.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<SocketQuery>,
    State(state): State<AppState>,
) -> Result<Response> {
    let user_id = match query.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => Some(authenticate(&state, token).await?.id),
        None => None,
    };

    let relay = Arc::clone(&state.relay);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, relay, user_id)))
}

async fn handle_socket(socket: WebSocket, relay: Arc<Relay>, user_id: Option<i64>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let connection_id = Uuid::new_v4();

    let (tx, mut rx) = mpsc::channel::<Frame>(CONNECTION_CHANNEL_BUFFER);
    relay.register(connection_id, tx);

    tracing::info!(
        connection_id = %connection_id,
        user_id = ?user_id,
        connections = relay.connection_count(),
        "Socket connected"
    );

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&frame) else {
                continue;
            };
            if ws_sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<Frame>(&text) {
                Ok(frame) => relay.handle_client_frame(connection_id, frame),
                Err(e) => {
                    tracing::warn!(connection_id = %connection_id, error = %e, "Unparsable socket frame");
                }
            },
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, error = %e, "Socket error");
                break;
            }
            _ => {}
        }
    }

    relay.unregister(connection_id);
    send_task.abort();

    tracing::info!(connection_id = %connection_id, "Socket disconnected");
}
