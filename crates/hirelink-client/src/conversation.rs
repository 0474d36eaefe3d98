//! Conversation assembly: one ordered, deduplicated timeline per selected
//! application.
//!
//! A timeline draws on three sources with three different shapes: persisted
//! history rows (`content` / `created_at`), live gateway pushes (`content` /
//! `timestamp`), and the proposal text carried by the application record,
//! which is never persisted as a message at all. Everything is normalized
//! into [`ChatEntry`] at this boundary; nothing downstream branches on where
//! an entry came from.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use hirelink_shared::constants::{PROPOSAL_ID_PREFIX, TEMP_ID_PREFIX};
use hirelink_shared::protocol::MessagePush;
use hirelink_shared::types::{ApplicationId, ApplicationStatus, JobId, UserId};
use hirelink_store::Message;

// ---------------------------------------------------------------------------
// Application (external reference data)
// ---------------------------------------------------------------------------

/// A job application as served by the marketplace CRUD layer. Read-only
/// here: messaging anchors a conversation on it and synthesizes the leading
/// proposal entry from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Application {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub job_title: String,
    pub freelancer_id: UserId,
    pub freelancer_name: String,
    pub employer_id: UserId,
    pub employer_name: String,
    pub proposal: Option<String>,
    pub bid: Option<f64>,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
}

impl Application {
    /// The conversation counterpart from `viewer`'s perspective.
    pub fn counterpart_of(&self, viewer: UserId) -> UserId {
        if viewer == self.employer_id {
            self.freelancer_id
        } else {
            self.employer_id
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical timeline entries
// ---------------------------------------------------------------------------

/// A real chat message in canonical shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    /// Server id, or a `temp_`-prefixed id while the send is in flight.
    pub id: String,
    pub sender: UserId,
    pub receiver: UserId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub pending: bool,
}

/// One entry of an assembled conversation timeline.
///
/// The variants carry their own eligibility rules: only `Real` is deletable,
/// only `Proposal` carries a bid, and neither `Proposal` nor `System` ever
/// exists in the message store.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEntry {
    Real(ChatMessage),
    Proposal {
        id: String,
        application: ApplicationId,
        sender: UserId,
        receiver: UserId,
        text: String,
        bid: Option<f64>,
        timestamp: DateTime<Utc>,
    },
    System {
        id: String,
        sender: UserId,
        text: String,
        timestamp: DateTime<Utc>,
    },
}

impl ChatEntry {
    pub fn id(&self) -> &str {
        match self {
            ChatEntry::Real(m) => &m.id,
            ChatEntry::Proposal { id, .. } => id,
            ChatEntry::System { id, .. } => id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ChatEntry::Real(m) => m.timestamp,
            ChatEntry::Proposal { timestamp, .. } => *timestamp,
            ChatEntry::System { timestamp, .. } => *timestamp,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            ChatEntry::Real(m) => &m.text,
            ChatEntry::Proposal { text, .. } => text,
            ChatEntry::System { text, .. } => text,
        }
    }

    /// Only persisted, settled real messages may be deleted.
    pub fn is_deletable(&self) -> bool {
        matches!(self, ChatEntry::Real(m) if !m.pending)
    }
}

/// Generate a temporary id for an optimistic send. The reserved prefix
/// keeps it disjoint from server-assigned ids.
pub fn temp_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4())
}

// ---------------------------------------------------------------------------
// Normalization boundary
// ---------------------------------------------------------------------------

/// Normalize a persisted history row.
pub fn normalize_stored(m: &Message) -> ChatEntry {
    if m.is_system {
        ChatEntry::System {
            id: m.id.to_string(),
            sender: m.sender,
            text: m.content.clone(),
            timestamp: m.created_at,
        }
    } else {
        ChatEntry::Real(ChatMessage {
            id: m.id.to_string(),
            sender: m.sender,
            receiver: m.receiver,
            text: m.content.clone(),
            timestamp: m.created_at,
            pending: false,
        })
    }
}

/// Normalize a live gateway push.
pub fn normalize_push(p: &MessagePush) -> ChatEntry {
    if p.is_system {
        ChatEntry::System {
            id: p.message_id.to_string(),
            sender: p.sender_id,
            text: p.content.clone(),
            timestamp: p.timestamp,
        }
    } else {
        ChatEntry::Real(ChatMessage {
            id: p.message_id.to_string(),
            sender: p.sender_id,
            receiver: p.receiver_id,
            text: p.content.clone(),
            timestamp: p.timestamp,
            pending: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// The assembled timeline for one application's conversation.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub application_id: ApplicationId,
    pub job_id: JobId,
    pub counterpart: UserId,
    entries: Vec<ChatEntry>,
    hidden: HashSet<String>,
}

impl Conversation {
    /// Build the timeline from the application record and persisted history.
    ///
    /// History rows are normalized and sorted ascending by creation time;
    /// if the application carries a proposal, a pseudo-message with a
    /// deterministic derived id is placed first, before all real messages,
    /// regardless of timestamps.
    pub fn assemble(application: &Application, viewer: UserId, history: &[Message]) -> Self {
        let mut entries: Vec<ChatEntry> = history.iter().map(normalize_stored).collect();
        entries.sort_by_key(ChatEntry::timestamp);

        if let Some(proposal) = &application.proposal {
            entries.insert(
                0,
                ChatEntry::Proposal {
                    id: format!("{PROPOSAL_ID_PREFIX}{}", application.id),
                    application: application.id,
                    sender: application.freelancer_id,
                    receiver: application.employer_id,
                    text: proposal.clone(),
                    bid: application.bid,
                    timestamp: application.applied_at,
                },
            );
        }

        Self {
            application_id: application.id,
            job_id: application.job_id,
            counterpart: application.counterpart_of(viewer),
            entries,
            hidden: HashSet::new(),
        }
    }

    /// All entries in timeline order, including locally hidden ones.
    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    /// Entries the viewer should actually see.
    pub fn visible_entries(&self) -> Vec<&ChatEntry> {
        self.entries
            .iter()
            .filter(|e| !self.hidden.contains(e.id()))
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id() == id)
    }

    /// Merge a live push into the timeline.
    ///
    /// Returns false (and changes nothing) when an entry with the same id is
    /// already present -- the message arrived through the other delivery
    /// path first. This is the at-most-once-visible guarantee.
    pub fn apply_live(&mut self, push: &MessagePush) -> bool {
        let entry = normalize_push(push);
        if self.contains(entry.id()) {
            debug!(id = %entry.id(), "duplicate delivery dropped");
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Append an optimistic pending message.
    pub fn push_pending(&mut self, message: ChatMessage) {
        self.entries.push(ChatEntry::Real(message));
    }

    /// Append an already-normalized entry (e.g. a freshly persisted system
    /// message).
    pub fn push_entry(&mut self, entry: ChatEntry) {
        if !self.contains(entry.id()) {
            self.entries.push(entry);
        }
    }

    /// Swap a pending entry for its authoritative persisted form, matched by
    /// temporary id. Returns false when no such pending entry exists (e.g.
    /// the user already switched away and back, refetching history).
    pub fn resolve_pending(&mut self, temp_id: &str, saved: &Message) -> bool {
        match self.entries.iter().position(|e| e.id() == temp_id) {
            Some(index) => {
                self.entries[index] = normalize_stored(saved);
                true
            }
            None => false,
        }
    }

    /// Remove an entry outright (optimistic rollback, or mirroring a REST
    /// delete). Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id() != id);
        self.entries.len() != before
    }

    /// Hide an entry from the local view only. The peer's copy and the
    /// persisted row are untouched; this never calls the delete endpoint.
    pub fn hide(&mut self, id: &str) {
        self.hidden.insert(id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use hirelink_shared::types::MessageId;

    fn application(proposal: Option<&str>, bid: Option<f64>) -> Application {
        Application {
            id: ApplicationId::new(),
            job_id: JobId::new(),
            job_title: "Build a parser".into(),
            freelancer_id: UserId::new(),
            freelancer_name: "Frida".into(),
            employer_id: UserId::new(),
            employer_name: "Edgar".into(),
            proposal: proposal.map(String::from),
            bid,
            status: ApplicationStatus::Pending,
            applied_at: Utc::now(),
        }
    }

    fn stored(app: &Application, sender: UserId, receiver: UserId, text: &str) -> Message {
        Message {
            id: MessageId::new(),
            sender,
            receiver,
            job: Some(app.job_id),
            content: text.into(),
            read: false,
            is_system: false,
            created_at: Utc::now(),
        }
    }

    fn push_for(m: &Message, sender_name: &str) -> MessagePush {
        MessagePush {
            message_id: m.id,
            sender_id: m.sender,
            sender_name: sender_name.into(),
            receiver_id: m.receiver,
            content: m.content.clone(),
            job_id: m.job,
            is_system: m.is_system,
            timestamp: m.created_at,
        }
    }

    #[test]
    fn proposal_pseudo_message_leads_the_timeline() {
        let app = application(Some("I can do this"), Some(500.0));
        let m1 = stored(&app, app.employer_id, app.freelancer_id, "When can you start?");

        let conv = Conversation::assemble(&app, app.employer_id, &[m1]);
        let entries = conv.entries();
        assert_eq!(entries.len(), 2);

        match &entries[0] {
            ChatEntry::Proposal {
                id,
                sender,
                text,
                bid,
                ..
            } => {
                assert_eq!(id, &format!("application_{}", app.id));
                assert_eq!(*sender, app.freelancer_id);
                assert_eq!(text, "I can do this");
                assert_eq!(*bid, Some(500.0));
            }
            other => panic!("expected proposal first, got {other:?}"),
        }
        assert!(!entries[0].is_deletable());
    }

    #[test]
    fn proposal_leads_even_when_its_timestamp_is_newest() {
        let mut app = application(Some("late proposal"), None);
        let m1 = stored(&app, app.employer_id, app.freelancer_id, "early message");
        // Application timestamp after the message timestamp.
        app.applied_at = Utc::now() + Duration::hours(1);

        let conv = Conversation::assemble(&app, app.freelancer_id, &[m1]);
        assert!(matches!(conv.entries()[0], ChatEntry::Proposal { .. }));
    }

    #[test]
    fn no_proposal_means_no_pseudo_message() {
        let app = application(None, None);
        let conv = Conversation::assemble(&app, app.employer_id, &[]);
        assert!(conv.entries().is_empty());
    }

    #[test]
    fn history_is_sorted_ascending() {
        let app = application(None, None);
        let mut m1 = stored(&app, app.employer_id, app.freelancer_id, "first");
        let mut m2 = stored(&app, app.freelancer_id, app.employer_id, "second");
        m1.created_at = Utc::now() - Duration::minutes(5);
        m2.created_at = Utc::now() - Duration::minutes(1);

        // Out-of-order input.
        let conv = Conversation::assemble(&app, app.employer_id, &[m2, m1]);
        let texts: Vec<_> = conv.entries().iter().map(ChatEntry::text).collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[test]
    fn duplicate_delivery_is_dropped_by_id() {
        let app = application(None, None);
        let m = stored(&app, app.counterpart_of(app.employer_id), app.employer_id, "hi");

        // Message arrives via REST history...
        let mut conv = Conversation::assemble(&app, app.employer_id, &[m.clone()]);
        // ...and again via the live relay with the same id.
        assert!(!conv.apply_live(&push_for(&m, "Frida")));
        assert_eq!(conv.entries().len(), 1);
    }

    #[test]
    fn live_push_with_fresh_id_is_appended() {
        let app = application(None, None);
        let mut conv = Conversation::assemble(&app, app.employer_id, &[]);

        let m = stored(&app, app.freelancer_id, app.employer_id, "new");
        assert!(conv.apply_live(&push_for(&m, "Frida")));
        // Replay of the same push is a no-op.
        assert!(!conv.apply_live(&push_for(&m, "Frida")));
        assert_eq!(conv.entries().len(), 1);
    }

    #[test]
    fn stored_and_live_shapes_normalize_identically() {
        let app = application(None, None);
        let m = stored(&app, app.freelancer_id, app.employer_id, "same message");

        assert_eq!(normalize_stored(&m), normalize_push(&push_for(&m, "Frida")));
    }

    #[test]
    fn system_rows_become_system_entries() {
        let app = application(None, None);
        let mut m = stored(&app, app.employer_id, app.freelancer_id, "Application status updated to: hired");
        m.is_system = true;

        let entry = normalize_stored(&m);
        assert!(matches!(entry, ChatEntry::System { .. }));
        assert!(!entry.is_deletable());
    }

    #[test]
    fn pending_send_resolves_to_server_identity() {
        let app = application(None, None);
        let mut conv = Conversation::assemble(&app, app.freelancer_id, &[]);

        let tmp = temp_id();
        assert!(tmp.starts_with("temp_"));
        conv.push_pending(ChatMessage {
            id: tmp.clone(),
            sender: app.freelancer_id,
            receiver: app.employer_id,
            text: "optimistic".into(),
            timestamp: Utc::now(),
            pending: true,
        });
        assert!(!conv.entries()[0].is_deletable());

        let saved = stored(&app, app.freelancer_id, app.employer_id, "optimistic");
        assert!(conv.resolve_pending(&tmp, &saved));

        assert_eq!(conv.entries().len(), 1);
        assert_eq!(conv.entries()[0].id(), saved.id.to_string());
        assert!(conv.entries()[0].is_deletable());

        // A relay echo of the now-persisted message does not duplicate it.
        assert!(!conv.apply_live(&push_for(&saved, "Frida")));
    }

    #[test]
    fn failed_send_rolls_back_cleanly() {
        let app = application(None, None);
        let mut conv = Conversation::assemble(&app, app.freelancer_id, &[]);

        let tmp = temp_id();
        conv.push_pending(ChatMessage {
            id: tmp.clone(),
            sender: app.freelancer_id,
            receiver: app.employer_id,
            text: "doomed".into(),
            timestamp: Utc::now(),
            pending: true,
        });

        assert!(conv.remove(&tmp));
        assert!(conv.entries().is_empty());
    }

    #[test]
    fn hide_is_local_view_only() {
        let app = application(None, None);
        let m = stored(&app, app.employer_id, app.freelancer_id, "awkward");
        let mut conv = Conversation::assemble(&app, app.freelancer_id, &[m.clone()]);

        conv.hide(&m.id.to_string());

        assert!(conv.visible_entries().is_empty());
        // The entry itself is still in the timeline; nothing was deleted.
        assert_eq!(conv.entries().len(), 1);
    }
}
