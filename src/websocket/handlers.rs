use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth;
use crate::services::chat_store::ChatStore;
use crate::services::message_service::MessageService;
use crate::services::read_receipt_service::ReadReceiptService;
use crate::state::AppState;
use crate::websocket::events::ServerEvent;
use crate::websocket::message_types::ClientEvent;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// Websocket entry point. The credential is verified before the upgrade
/// completes; an unauthenticated request is rejected with 401 and never
/// reaches the registry.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let token = params
        .token
        .or_else(|| auth::extract_credential(&headers))
        .ok_or(AppError::Unauthorized)?;
    let claims = auth::verify_token(&token, &state.config.jwt_secret)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;

    // The session lives no longer than the credential it was opened with.
    let remaining = (claims.exp - chrono::Utc::now().timestamp()).max(0) as u64;
    let session_ttl = Duration::from_secs(remaining);

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id, session_ttl)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid, session_ttl: Duration) {
    let conn_id = Uuid::new_v4();
    let mut outbound = state.registry.register(conn_id, user_id).await;
    let (mut sender, mut receiver) = socket.split();

    tracing::info!(%user_id, %conn_id, "websocket connected");

    let expiry = tokio::time::sleep(session_ttl);
    tokio::pin!(expiry);

    loop {
        tokio::select! {
            () = &mut expiry => {
                tracing::info!(%user_id, %conn_id, "session credential expired, closing");
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            Some(msg) = outbound.recv() => {
                if sender.send(msg).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_frame(&state, conn_id, user_id, &text).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::debug!(%conn_id, "websocket receive error: {}", err);
                        break;
                    }
                }
            }
            else => break,
        }
    }

    state.registry.disconnect(conn_id).await;
    tracing::info!(%user_id, %conn_id, "websocket disconnected");
}

async fn handle_client_frame(state: &AppState, conn_id: Uuid, user_id: Uuid, raw: &str) {
    let event: ClientEvent = match serde_json::from_str(raw) {
        Ok(event) => event,
        Err(err) => {
            let ack = ServerEvent::error("unknown", format!("malformed event: {err}"));
            state.registry.send_to(conn_id, ack.to_message()).await;
            return;
        }
    };

    let name = event.name();
    if let Err(err) = dispatch(state, conn_id, user_id, event).await {
        tracing::warn!(%user_id, event = name, "websocket event failed: {}", err);
        let ack = ServerEvent::error(name, err.to_string());
        state.registry.send_to(conn_id, ack.to_message()).await;
    }
}

/// One client event, one outcome. Failures are acked to the sending
/// connection only; broadcasts happen after the database work commits.
async fn dispatch(
    state: &AppState,
    conn_id: Uuid,
    user_id: Uuid,
    event: ClientEvent,
) -> Result<(), AppError> {
    match event {
        ClientEvent::JoinChat { chat_id } => {
            if !ChatStore::is_participant(&state.db, chat_id, user_id).await? {
                return Err(AppError::Forbidden);
            }
            state.registry.join(conn_id, chat_id).await;
        }
        ClientEvent::LeaveChat { chat_id } => {
            state.registry.leave(conn_id, chat_id).await;
        }
        ClientEvent::SendMessage {
            chat_id,
            text,
            reply_to_message_id,
        } => {
            let message =
                MessageService::send(&state.db, chat_id, user_id, &text, reply_to_message_id)
                    .await?;
            let event = ServerEvent::ReceiveMessage { chat_id, message };
            state.registry.broadcast(chat_id, event.to_message()).await;
        }
        ClientEvent::Typing { chat_id } => {
            if !ChatStore::is_participant(&state.db, chat_id, user_id).await? {
                return Err(AppError::Forbidden);
            }
            let event = ServerEvent::Typing { chat_id, user_id };
            state
                .registry
                .broadcast_except(chat_id, conn_id, event.to_message())
                .await;
        }
        ClientEvent::ReadMessage { message_id, .. } => {
            let outcome = ReadReceiptService::mark_read(&state.db, message_id, user_id).await?;
            // Broadcast to the chat the message actually belongs to, not
            // whatever chat_id the client claimed.
            let event = ServerEvent::MessageRead {
                chat_id: outcome.chat_id,
                message_id,
                user_id,
                is_read: outcome.fully_read,
            };
            state
                .registry
                .broadcast(outcome.chat_id, event.to_message())
                .await;
        }
    }
    Ok(())
}
