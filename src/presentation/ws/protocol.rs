//! WebSocket Protocol
//!
//! JSON event frames exchanged with clients. Every frame is tagged with an
//! `event` name and carries its payload under `data`.

use serde::{Deserialize, Serialize};

use crate::domain::Message;

/// Client-to-server events
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Connection handshake; must be the first frame on a connection
    Authenticate { token: String },

    /// Send a message to exactly one of a group or a user
    SendMessage {
        content: String,
        #[serde(default)]
        group_id: Option<i64>,
        #[serde(default)]
        receiver_id: Option<i64>,
    },

    /// Join a group room (membership is checked)
    JoinGroup { group_id: i64 },

    /// Leave a group room (unconditional)
    LeaveGroup { group_id: i64 },

    TypingStart {
        #[serde(default)]
        group_id: Option<i64>,
        #[serde(default)]
        receiver_id: Option<i64>,
    },

    TypingStop {
        #[serde(default)]
        group_id: Option<i64>,
        #[serde(default)]
        receiver_id: Option<i64>,
    },
}

/// Wire representation of a persisted message.
///
/// IDs are serialized as strings so JavaScript clients keep full precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_type: String,
    pub receiver_id: String,
    pub content: String,
    pub created_at: String,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.to_string(),
            conversation_id: message.conversation_id.to_string(),
            sender_id: message.sender_id.to_string(),
            receiver_type: message.receiver_type.as_str().to_string(),
            receiver_id: message.receiver_id.to_string(),
            content: message.content.clone(),
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

/// Server-to-client events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Handshake succeeded; the connection is Active
    Authenticated { user_id: String },

    /// Ack to the sender of a persisted message
    MessageSent { message: MessageView },

    /// Fan-out of a persisted message to a room
    NewMessage { message: MessageView },

    GroupJoined { group_id: String },

    GroupLeft { group_id: String },

    /// Best-effort typing indicator, no delivery guarantee
    Typing {
        user_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        group_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        receiver_id: Option<String>,
        typing: bool,
    },

    UserOnline { user_id: String, status: String },

    UserOffline { user_id: String, status: String },

    /// Operation-level failure; the connection survives unless the code is
    /// an authentication code
    Error { code: u16, message: String },
}

impl ServerEvent {
    pub fn error(err: &crate::shared::error::AppError) -> Self {
        Self::Error {
            code: err.code(),
            message: err.client_message(),
        }
    }

    pub fn user_online(user_id: i64) -> Self {
        Self::UserOnline {
            user_id: user_id.to_string(),
            status: "online".into(),
        }
    }

    pub fn user_offline(user_id: i64) -> Self {
        Self::UserOffline {
            user_id: user_id.to_string(),
            status: "offline".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn client_event_round_trips_event_tag() {
        let frame = r#"{"event":"send_message","data":{"content":"hi","receiver_id":42}}"#;
        let event: ClientEvent = serde_json::from_str(frame).unwrap();
        match event {
            ClientEvent::SendMessage {
                content,
                group_id,
                receiver_id,
            } => {
                assert_eq!(content, "hi");
                assert_eq!(group_id, None);
                assert_eq!(receiver_id, Some(42));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn authenticate_frame_parses() {
        let frame = r#"{"event":"authenticate","data":{"token":"abc"}}"#;
        let event: ClientEvent = serde_json::from_str(frame).unwrap();
        assert!(matches!(event, ClientEvent::Authenticate { token } if token == "abc"));
    }

    #[test]
    fn server_event_serializes_with_tag() {
        let json = serde_json::to_value(ServerEvent::user_online(7)).unwrap();
        assert_eq!(json["event"], "user_online");
        assert_eq!(json["data"]["user_id"], "7");
        assert_eq!(json["data"]["status"], "online");
    }
}
