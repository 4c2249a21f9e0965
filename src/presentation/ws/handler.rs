//! WebSocket Connection Handler
//!
//! Drives one transport session through its lifecycle: handshake with an
//! authentication timeout, the active read loop, and teardown.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitStream, StreamExt},
    SinkExt,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

use super::protocol::{ClientEvent, ServerEvent};
use crate::startup::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle one WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();

    tracing::debug!(connection_id = %connection_id, "New WebSocket connection");

    // Split socket for concurrent read/write
    let (mut sink, mut stream) = socket.split();

    // Outgoing frames go through a channel so fan-out never blocks on a
    // slow socket.
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let sender_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!("Failed to serialize event: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Handshake: the first frame must carry a credential, within the
    // configured window. Fails closed.
    let auth_timeout = Duration::from_secs(state.settings.websocket.auth_timeout_secs);
    let token = match timeout(auth_timeout, wait_for_credential(&mut stream)).await {
        Ok(Some(token)) => token,
        Ok(None) => {
            tracing::debug!(connection_id = %connection_id, "Connection closed before authentication");
            refuse(&tx, 4001, "Authentication required").await;
            sender_task.abort();
            return;
        }
        Err(_) => {
            tracing::debug!(connection_id = %connection_id, "Authentication timeout");
            refuse(&tx, 4001, "Authentication timeout").await;
            sender_task.abort();
            return;
        }
    };

    let user_id = match state.dispatcher.authenticate(&token).await {
        Ok(id) => id,
        Err(e) => {
            tracing::debug!(connection_id = %connection_id, error = %e, "Invalid token");
            let _ = tx.send(ServerEvent::error(&e));
            tokio::time::sleep(Duration::from_millis(100)).await;
            sender_task.abort();
            return;
        }
    };

    // Authenticated -> Active: register, auto-join the user room.
    state.dispatcher.connect(user_id, connection_id, tx.clone());

    // Active read loop. One task per connection, so this sender's events
    // are handled strictly in submission order.
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    if let Err(err) = state
                        .dispatcher
                        .handle_event(user_id, connection_id, event)
                        .await
                    {
                        let fatal = err.is_connection_fatal();
                        let _ = tx.send(ServerEvent::error(&err));
                        if fatal {
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(connection_id = %connection_id, error = %e, "Malformed frame");
                    let _ = tx.send(ServerEvent::Error {
                        code: 4000,
                        message: "Malformed event frame".into(),
                    });
                }
            },
            Ok(Message::Close(_)) => {
                tracing::debug!(connection_id = %connection_id, "Connection closed");
                break;
            }
            Ok(_) => {
                // Ping/pong handled by axum; binary frames ignored
            }
            Err(e) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Closed: registry and room cleanup, offline broadcast if last device.
    state.dispatcher.disconnect(connection_id);
    sender_task.abort();
}

/// Wait for the handshake credential. Any first frame other than
/// `authenticate` refuses the connection.
async fn wait_for_credential(stream: &mut SplitStream<WebSocket>) -> Option<String> {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                return match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(ClientEvent::Authenticate { token }) => Some(token),
                    _ => None,
                };
            }
            Ok(Message::Close(_)) => return None,
            Err(_) => return None,
            _ => continue,
        }
    }
    None
}

/// Send a final error frame and give the writer a moment to flush it.
async fn refuse(tx: &mpsc::UnboundedSender<ServerEvent>, code: u16, message: &str) {
    let _ = tx.send(ServerEvent::Error {
        code,
        message: message.into(),
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
}
