use serde::Deserialize;
use uuid::Uuid;

/// Events a client may send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "join-chat")]
    JoinChat { chat_id: Uuid },

    #[serde(rename = "leave-chat")]
    LeaveChat { chat_id: Uuid },

    #[serde(rename = "send-message")]
    SendMessage {
        chat_id: Uuid,
        text: String,
        #[serde(default)]
        reply_to_message_id: Option<Uuid>,
    },

    #[serde(rename = "typing")]
    Typing { chat_id: Uuid },

    #[serde(rename = "read-message")]
    ReadMessage { chat_id: Uuid, message_id: Uuid },
}

impl ClientEvent {
    /// Event name used when acking an error back to the sender.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinChat { .. } => "join-chat",
            ClientEvent::LeaveChat { .. } => "leave-chat",
            ClientEvent::SendMessage { .. } => "send-message",
            ClientEvent::Typing { .. } => "typing",
            ClientEvent::ReadMessage { .. } => "read-message",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_message_without_reply() {
        let raw = r#"{"type":"send-message","chat_id":"7b1e9dd2-06a3-4a9e-9d59-0f8b9a2f1c11","text":"hi"}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        match event {
            ClientEvent::SendMessage {
                text,
                reply_to_message_id,
                ..
            } => {
                assert_eq!(text, "hi");
                assert!(reply_to_message_id.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_event_type() {
        let raw = r#"{"type":"delete-chat","chat_id":"7b1e9dd2-06a3-4a9e-9d59-0f8b9a2f1c11"}"#;
        assert!(serde_json::from_str::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn parses_read_message() {
        let raw = r#"{"type":"read-message","chat_id":"7b1e9dd2-06a3-4a9e-9d59-0f8b9a2f1c11","message_id":"b8a7a0e3-6a54-4f55-9ed2-4f2e1f0f9a22"}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        assert!(matches!(event, ClientEvent::ReadMessage { .. }));
        assert_eq!(event.name(), "read-message");
    }
}
