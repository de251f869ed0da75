use axum::extract::ws::Message;
use serde::Serialize;
use uuid::Uuid;

use crate::services::message_service::HydratedMessage;

/// Events the server pushes to clients.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "receive-message")]
    ReceiveMessage {
        chat_id: Uuid,
        message: HydratedMessage,
    },

    #[serde(rename = "typing")]
    Typing { chat_id: Uuid, user_id: Uuid },

    #[serde(rename = "message-read")]
    MessageRead {
        chat_id: Uuid,
        message_id: Uuid,
        user_id: Uuid,
        is_read: bool,
    },

    #[serde(rename = "error")]
    Error { event: String, message: String },
}

impl ServerEvent {
    pub fn error(event: &str, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            event: event.to_string(),
            message: message.into(),
        }
    }

    /// Serialize into a websocket text frame.
    pub fn to_message(&self) -> Message {
        // ServerEvent carries only serializable fields; this cannot fail
        // in practice, but a broken frame should not kill the socket task.
        match serde_json::to_string(self) {
            Ok(json) => Message::Text(json),
            Err(err) => {
                tracing::error!("failed to serialize server event: {}", err);
                Message::Text(
                    r#"{"type":"error","event":"internal","message":"serialization failure"}"#
                        .to_string(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_event_serializes_with_tag() {
        let event = ServerEvent::Typing {
            chat_id: Uuid::nil(),
            user_id: Uuid::nil(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"typing""#));
        assert!(json.contains(r#""chat_id""#));
    }

    #[test]
    fn error_event_names_the_failed_client_event() {
        let event = ServerEvent::error("send-message", "text must not be empty");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains(r#""event":"send-message""#));
    }

    #[test]
    fn message_read_carries_promotion_flag() {
        let event = ServerEvent::MessageRead {
            chat_id: Uuid::nil(),
            message_id: Uuid::nil(),
            user_id: Uuid::nil(),
            is_read: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""is_read":true"#));
    }
}
