//! WebSocket gateway.
//!
//! One endpoint, `GET /ws?token=<jwt>`. The credential is verified during
//! the handshake, before the upgrade response: a bad or missing token gets a
//! 401 and no connection state is ever retained.
//!
//! Each accepted connection runs two tasks: a writer draining the
//! connection's outbound event queue onto the socket, and a reader decoding
//! client events. They are torn down together, after which the connection
//! unregisters from presence (unless a reconnect already replaced it).

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use hirelink_shared::protocol::{room_key, ClientEvent, MessagePush, ServerEvent};
use hirelink_shared::types::MessageId;

use crate::api::AppState;
use crate::auth::{resolve_token, CurrentUser};
use crate::error::ServerError;
use crate::presence::ConnectionHandle;

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Handshake: authenticate, then upgrade.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ServerError> {
    let token = query
        .token
        .ok_or_else(|| ServerError::Authentication("Authentication error: no token provided".into()))?;

    let user = resolve_token(&state, &token)?;

    Ok(ws.on_upgrade(move |socket| handle_connection(socket, state, user)))
}

async fn handle_connection(socket: WebSocket, state: AppState, user: CurrentUser) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let connection_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let handle = ConnectionHandle::new(connection_id, user.name.clone(), tx);

    // Last-connect-wins: a lingering connection for the same user is
    // replaced, its queue drops, and its writer task ends.
    let replaced = state.presence.register(user.id, handle.clone()).await;
    if replaced.is_some() {
        debug!(user = %user.id.short(), "replaced stale connection");
    }

    state
        .presence
        .broadcast_except(
            user.id,
            ServerEvent::UserOnline {
                user_id: user.id,
                name: user.name.clone(),
            },
        )
        .await;

    handle.push(ServerEvent::OnlineUsers {
        users: state.presence.online_users().await,
    });

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match event.to_json() {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "failed to encode server event");
                    continue;
                }
            };
            if ws_tx.send(WsMessage::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_user = user.clone();
    let recv_handle = handle.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = ws_rx.next().await {
            match frame {
                WsMessage::Text(text) => {
                    handle_client_event(&recv_state, &recv_user, &recv_handle, text.as_str()).await;
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    // One side ending tears the other down.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    };

    // Only announce offline if this connection still owns the presence
    // entry; a reconnect may already have replaced it.
    if state
        .presence
        .unregister_connection(user.id, connection_id)
        .await
    {
        state
            .presence
            .broadcast_all(ServerEvent::UserOffline {
                user_id: user.id,
                name: user.name.clone(),
            })
            .await;
    }
}

/// Dispatch one decoded client event.
///
/// Malformed payloads answer with an `error` event on the same connection;
/// they never terminate it or affect other connections.
async fn handle_client_event(
    state: &AppState,
    user: &CurrentUser,
    self_handle: &ConnectionHandle,
    text: &str,
) {
    let event = match ClientEvent::from_json(text) {
        Ok(event) => event,
        Err(e) => {
            debug!(user = %user.id.short(), error = %e, "malformed gateway event");
            self_handle.push(ServerEvent::Error {
                message: "Malformed event payload".into(),
            });
            return;
        }
    };

    match event {
        ClientEvent::SendMessage {
            receiver_id,
            content,
            job_id,
            message_id,
            is_system,
        } => {
            if content.trim().is_empty() {
                self_handle.push(ServerEvent::Error {
                    message: "Missing required fields".into(),
                });
                return;
            }

            // The relay does not persist. A missing id means the message is
            // relay-only and gets a fresh id for this delivery.
            let message_id = message_id.unwrap_or_else(MessageId::new);
            let timestamp = Utc::now();

            let delivered = state
                .delivery
                .push_to_user(
                    receiver_id,
                    ServerEvent::ReceiveMessage(MessagePush {
                        message_id,
                        sender_id: user.id,
                        sender_name: user.name.clone(),
                        receiver_id,
                        content,
                        job_id,
                        is_system,
                        timestamp,
                    }),
                )
                .await;

            self_handle.push(ServerEvent::MessageSent {
                message_id,
                receiver_id,
                delivered,
                timestamp,
            });
        }

        ClientEvent::TypingStart { receiver_id } => {
            state
                .delivery
                .push_to_user(
                    receiver_id,
                    ServerEvent::UserTyping {
                        user_id: user.id,
                        name: user.name.clone(),
                    },
                )
                .await;
        }

        ClientEvent::TypingStop { receiver_id } => {
            state
                .delivery
                .push_to_user(
                    receiver_id,
                    ServerEvent::UserStoppedTyping { user_id: user.id },
                )
                .await;
        }

        ClientEvent::MessageRead {
            message_id,
            sender_id: original_sender,
        } => {
            state
                .delivery
                .push_to_user(
                    original_sender,
                    ServerEvent::MessageReadReceipt {
                        message_id,
                        read_by: user.id,
                        read_at: Utc::now(),
                    },
                )
                .await;
        }

        ClientEvent::JoinConversation { user_id: peer } => {
            let room = room_key(user.id, peer);
            state.presence.join_room(&room, user.id).await;
        }

        ClientEvent::LeaveConversation { user_id: peer } => {
            let room = room_key(user.id, peer);
            state.presence.leave_room(&room, user.id).await;
        }
    }
}
