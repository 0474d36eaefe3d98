//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the REST layer as a JSON body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hirelink_shared::types::{JobId, MessageId, Role, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A marketplace user. Reference data only: account creation and credential
/// issuance belong to the identity layer, messaging merely resolves ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A job posting. Reference data used to scope conversations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub title: String,
    pub employer_id: UserId,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single persisted chat message.
///
/// Once inserted, `sender`, `receiver`, `job`, and `content` never change;
/// `read` is the only mutable field and only the receiver may flip it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub sender: UserId,
    pub receiver: UserId,
    /// Optional job scope. May refer to a job that has since been deleted.
    pub job: Option<JobId>,
    pub content: String,
    pub read: bool,
    /// True for status-transition notices sent through the chat channel.
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ConversationSummary
// ---------------------------------------------------------------------------

/// One entry of the conversations overview: a partner, the most recent
/// message exchanged with them, and how many of their messages the viewer
/// has not read yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationSummary {
    pub partner_id: UserId,
    pub partner_name: String,
    pub last_message: Message,
    pub unread_count: u64,
}
