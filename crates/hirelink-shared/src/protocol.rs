//! Gateway wire protocol.
//!
//! Every frame on the live channel is a JSON object `{"event": ..., "data":
//! ...}`. The same event names are used by the REST layer's delivery pushes,
//! so a client consumes one schema regardless of which path produced the
//! frame.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{JobId, MessageId, UserId};

/// Events a connected client may send to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Relay a message to an online peer. `message_id` carries the
    /// REST-persisted id so both delivery paths agree on identity.
    SendMessage {
        receiver_id: UserId,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_id: Option<JobId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<MessageId>,
        #[serde(default)]
        is_system: bool,
    },
    TypingStart { receiver_id: UserId },
    TypingStop { receiver_id: UserId },
    /// Tell the original sender their message was read.
    MessageRead {
        message_id: MessageId,
        sender_id: UserId,
    },
    JoinConversation { user_id: UserId },
    LeaveConversation { user_id: UserId },
}

/// A message as pushed over the live channel.
///
/// Note the field names differ from the persisted REST shape on purpose
/// (`content`/`timestamp` vs `content`/`created_at`): clients absorb the
/// drift at their normalization boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessagePush {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub receiver_id: UserId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub is_system: bool,
    pub timestamp: DateTime<Utc>,
}

/// Events the gateway (or a REST handler via the delivery façade) pushes to
/// a connected client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    ReceiveMessage(MessagePush),
    /// Echo to the sender of a `send_message`. `delivered` reflects whether
    /// the receiver was online at relay time.
    MessageSent {
        message_id: MessageId,
        receiver_id: UserId,
        delivered: bool,
        timestamp: DateTime<Utc>,
    },
    UserTyping { user_id: UserId, name: String },
    UserStoppedTyping { user_id: UserId },
    MessageReadReceipt {
        message_id: MessageId,
        read_by: UserId,
        read_at: DateTime<Utc>,
    },
    /// Bulk read notification (mark-all-read on a conversation).
    MessagesRead {
        read_by: UserId,
        count: u64,
        read_at: DateTime<Utc>,
    },
    MessageDeleted {
        message_id: MessageId,
        deleted_by: UserId,
    },
    UserOnline { user_id: UserId, name: String },
    UserOffline { user_id: UserId, name: String },
    OnlineUsers { users: Vec<UserId> },
    Error { message: String },
}

impl ClientEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Room key for a two-party conversation: the participant ids in stable
/// sorted order, so both sides derive the same key.
pub fn room_key(a: UserId, b: UserId) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{lo}-{hi}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_roundtrip() {
        let ev = ClientEvent::SendMessage {
            receiver_id: UserId::new(),
            content: "Can you start Monday?".into(),
            job_id: Some(JobId::new()),
            message_id: Some(MessageId::new()),
            is_system: false,
        };
        let json = ev.to_json().unwrap();
        assert_eq!(ClientEvent::from_json(&json).unwrap(), ev);
    }

    #[test]
    fn server_event_roundtrip() {
        let ev = ServerEvent::ReceiveMessage(MessagePush {
            message_id: MessageId::new(),
            sender_id: UserId::new(),
            sender_name: "Frida".into(),
            receiver_id: UserId::new(),
            content: "hello".into(),
            job_id: None,
            is_system: false,
            timestamp: Utc::now(),
        });
        let json = ev.to_json().unwrap();
        assert_eq!(ServerEvent::from_json(&json).unwrap(), ev);
    }

    #[test]
    fn event_tag_is_snake_case() {
        let ev = ClientEvent::TypingStart {
            receiver_id: UserId::new(),
        };
        let json = ev.to_json().unwrap();
        assert!(json.contains("\"event\":\"typing_start\""));
    }

    #[test]
    fn room_key_is_order_independent() {
        let a = UserId::new();
        let b = UserId::new();
        assert_eq!(room_key(a, b), room_key(b, a));
        assert_ne!(room_key(a, b), room_key(a, a));
    }

    #[test]
    fn malformed_event_is_rejected() {
        assert!(ClientEvent::from_json("{\"event\":\"bogus\"}").is_err());
    }
}
