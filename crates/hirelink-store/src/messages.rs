//! The message store: persistence and queries for chat messages.
//!
//! This is the system of record for the messaging core. The gateway never
//! writes messages itself; every message enters through
//! [`Database::send_message`] and real-time relay is a latency optimization
//! layered on top.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::params;

use hirelink_shared::constants::MAX_MESSAGE_LEN;
use hirelink_shared::types::{JobId, MessageId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{ConversationSummary, Message};

impl Database {
    /// Persist a new message after validating it.
    ///
    /// Rejects self-sends, empty or over-long content, and unknown
    /// receivers. A job reference that no longer resolves is allowed (the
    /// job may have been deleted mid-conversation); it is logged and the
    /// message is persisted with the dangling reference.
    pub fn send_message(
        &self,
        sender: UserId,
        receiver: UserId,
        content: &str,
        job: Option<JobId>,
        is_system: bool,
    ) -> Result<Message> {
        if sender == receiver {
            return Err(StoreError::Validation(
                "You cannot send a message to yourself".into(),
            ));
        }

        let content = content.trim();
        if content.is_empty() {
            return Err(StoreError::Validation(
                "Message content is required".into(),
            ));
        }
        if content.chars().count() > MAX_MESSAGE_LEN {
            return Err(StoreError::Validation(format!(
                "Message content cannot exceed {MAX_MESSAGE_LEN} characters"
            )));
        }

        if !self.user_exists(receiver)? {
            return Err(StoreError::UserNotFound);
        }

        if let Some(job_id) = job {
            if !self.job_exists(job_id)? {
                tracing::warn!(job = %job_id, "job not found, persisting message anyway");
            }
        }

        let message = Message {
            id: MessageId::new(),
            sender,
            receiver,
            job,
            content: content.to_string(),
            read: false,
            is_system,
            created_at: Utc::now(),
        };

        self.conn().execute(
            "INSERT INTO messages (id, sender, receiver, job, content, read, is_system, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                message.id.to_string(),
                message.sender.to_string(),
                message.receiver.to_string(),
                message.job.map(|j| j.to_string()),
                message.content,
                message.read,
                message.is_system,
                message.created_at.to_rfc3339(),
            ],
        )?;

        Ok(message)
    }

    /// Fetch a single message by id.
    pub fn message_by_id(&self, id: MessageId) -> Result<Message> {
        self.conn()
            .query_row(
                "SELECT id, sender, receiver, job, content, read, is_system, created_at
                 FROM messages WHERE id = ?1",
                params![id.to_string()],
                row_to_message,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Full history between two users, both directions, ascending by
    /// creation time (insertion order breaks ties).
    pub fn conversation_between(&self, a: UserId, b: UserId) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, sender, receiver, job, content, read, is_system, created_at
             FROM messages
             WHERE (sender = ?1 AND receiver = ?2) OR (sender = ?2 AND receiver = ?1)
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt.query_map(params![a.to_string(), b.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// History scoped to one job, restricted to messages involving `viewer`,
    /// ascending. A job that no longer exists yields an empty list rather
    /// than an error: the conversation outlives the posting.
    pub fn job_conversation(&self, job: JobId, viewer: UserId) -> Result<Vec<Message>> {
        if !self.job_exists(job)? {
            tracing::warn!(job = %job, "job not found, returning empty history");
            return Ok(Vec::new());
        }

        let mut stmt = self.conn().prepare(
            "SELECT id, sender, receiver, job, content, read, is_system, created_at
             FROM messages
             WHERE job = ?1 AND (sender = ?2 OR receiver = ?2)
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt.query_map(params![job.to_string(), viewer.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// All conversations involving `user`, grouped by partner, newest
    /// partner first. Each summary carries the most recent message and the
    /// viewer's unread count for that partner.
    pub fn conversations_for(&self, user: UserId) -> Result<Vec<ConversationSummary>> {
        let mut stmt = self.conn().prepare(
            "SELECT m.id, m.sender, m.receiver, m.job, m.content, m.read, m.is_system,
                    m.created_at
             FROM messages m
             WHERE m.sender = ?1 OR m.receiver = ?1
             ORDER BY m.created_at DESC, m.rowid DESC",
        )?;

        let rows = stmt.query_map(params![user.to_string()], row_to_message)?;

        // Newest-first scan: the first message seen per partner is the last
        // exchanged, which also fixes the partner ordering.
        let mut order: Vec<UserId> = Vec::new();
        let mut summaries: HashMap<UserId, ConversationSummary> = HashMap::new();

        for row in rows {
            let message = row?;
            let partner_id = if message.sender == user {
                message.receiver
            } else {
                message.sender
            };

            let entry = summaries.entry(partner_id).or_insert_with(|| {
                order.push(partner_id);
                ConversationSummary {
                    partner_id,
                    partner_name: String::new(),
                    last_message: message.clone(),
                    unread_count: 0,
                }
            });

            if message.receiver == user && !message.read {
                entry.unread_count += 1;
            }
        }

        let mut result = Vec::with_capacity(order.len());
        for partner_id in order {
            if let Some(mut summary) = summaries.remove(&partner_id) {
                summary.partner_name = self
                    .user_by_id(partner_id)
                    .map(|u| u.name)
                    .unwrap_or_default();
                result.push(summary);
            }
        }
        Ok(result)
    }

    /// Mark one message as read.
    ///
    /// Only the receiver may do this; marking an already-read message is a
    /// silent success. Returns the message in its post-update state.
    pub fn mark_read(&self, id: MessageId, acting: UserId) -> Result<Message> {
        let mut message = self.message_by_id(id)?;

        if message.receiver != acting {
            return Err(StoreError::Authorization(
                "You can only mark messages sent to you as read".into(),
            ));
        }

        if !message.read {
            self.conn().execute(
                "UPDATE messages SET read = 1 WHERE id = ?1",
                params![id.to_string()],
            )?;
            message.read = true;
        }

        Ok(message)
    }

    /// Mark every unread message from `from` to `to` as read. Returns the
    /// number of rows changed.
    pub fn mark_conversation_read(&self, from: UserId, to: UserId) -> Result<usize> {
        let changed = self.conn().execute(
            "UPDATE messages SET read = 1
             WHERE sender = ?1 AND receiver = ?2 AND read = 0",
            params![from.to_string(), to.to_string()],
        )?;
        Ok(changed)
    }

    /// Delete a message. Only the sender may do this; the row is removed
    /// outright. Returns the deleted message so the caller can notify the
    /// receiver.
    pub fn delete_message(&self, id: MessageId, acting: UserId) -> Result<Message> {
        let message = self.message_by_id(id)?;

        if message.sender != acting {
            return Err(StoreError::Authorization(
                "You can only delete messages you sent".into(),
            ));
        }

        self.conn().execute(
            "DELETE FROM messages WHERE id = ?1",
            params![id.to_string()],
        )?;

        Ok(message)
    }

    /// Number of unread messages addressed to `user`.
    pub fn unread_count(&self, user: UserId) -> Result<i64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages WHERE receiver = ?1 AND read = 0",
            params![user.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let sender_str: String = row.get(1)?;
    let receiver_str: String = row.get(2)?;
    let job_str: Option<String> = row.get(3)?;
    let content: String = row.get(4)?;
    let read: bool = row.get(5)?;
    let is_system: bool = row.get(6)?;
    let ts_str: String = row.get(7)?;

    let id = MessageId::parse(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let sender = UserId::parse(&sender_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let receiver = UserId::parse(&receiver_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let job = match job_str {
        Some(s) => Some(JobId::parse(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Message {
        id,
        sender,
        receiver,
        job,
        content,
        read,
        is_system,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Job, User};
    use hirelink_shared::types::Role;

    struct Fixture {
        db: Database,
        _dir: tempfile::TempDir,
        freelancer: UserId,
        employer: UserId,
        job: JobId,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();

        let freelancer = UserId::new();
        let employer = UserId::new();
        db.insert_user(&User {
            id: freelancer,
            name: "Frida".into(),
            email: "frida@example.com".into(),
            role: Role::Freelancer,
            created_at: Utc::now(),
        })
        .unwrap();
        db.insert_user(&User {
            id: employer,
            name: "Edgar".into(),
            email: "edgar@example.com".into(),
            role: Role::Employer,
            created_at: Utc::now(),
        })
        .unwrap();

        let job = JobId::new();
        db.insert_job(&Job {
            id: job,
            title: "Build a parser".into(),
            employer_id: employer,
            created_at: Utc::now(),
        })
        .unwrap();

        Fixture {
            db,
            _dir: dir,
            freelancer,
            employer,
            job,
        }
    }

    #[test]
    fn send_persists_exactly_once() {
        let f = fixture();
        let sent = f
            .db
            .send_message(f.employer, f.freelancer, "Can you start Monday?", Some(f.job), false)
            .unwrap();

        let history = f.db.conversation_between(f.employer, f.freelancer).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0], sent);
        assert!(!history[0].read);
    }

    #[test]
    fn self_send_is_rejected() {
        let f = fixture();
        let err = f
            .db
            .send_message(f.employer, f.employer, "hi me", None, false)
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn empty_and_overlong_content_are_rejected() {
        let f = fixture();
        assert!(matches!(
            f.db.send_message(f.employer, f.freelancer, "   ", None, false),
            Err(StoreError::Validation(_))
        ));

        let long = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert!(matches!(
            f.db.send_message(f.employer, f.freelancer, &long, None, false),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn unknown_receiver_is_rejected() {
        let f = fixture();
        let err = f
            .db
            .send_message(f.employer, UserId::new(), "hello?", None, false)
            .unwrap_err();
        assert!(matches!(err, StoreError::UserNotFound));
    }

    #[test]
    fn conversation_is_ordered_ascending() {
        let f = fixture();
        for text in ["one", "two", "three"] {
            f.db.send_message(f.employer, f.freelancer, text, None, false)
                .unwrap();
        }
        f.db.send_message(f.freelancer, f.employer, "four", None, false)
            .unwrap();

        let history = f.db.conversation_between(f.freelancer, f.employer).unwrap();
        let texts: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, ["one", "two", "three", "four"]);
        for pair in history.windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
    }

    #[test]
    fn job_history_filters_by_job_and_viewer() {
        let f = fixture();
        f.db.send_message(f.employer, f.freelancer, "scoped", Some(f.job), false)
            .unwrap();
        f.db.send_message(f.employer, f.freelancer, "unscoped", None, false)
            .unwrap();

        let history = f.db.job_conversation(f.job, f.freelancer).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "scoped");

        // A third party sees nothing in this job's thread.
        let outsider = UserId::new();
        let history = f.db.job_conversation(f.job, outsider).unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn vanished_job_yields_empty_history_not_error() {
        let f = fixture();
        f.db.send_message(f.employer, f.freelancer, "still here", Some(f.job), false)
            .unwrap();
        f.db.delete_job(f.job).unwrap();

        let history = f.db.job_conversation(f.job, f.freelancer).unwrap();
        assert!(history.is_empty());

        // The message itself survives in the pair conversation.
        let pair = f.db.conversation_between(f.employer, f.freelancer).unwrap();
        assert_eq!(pair.len(), 1);
    }

    #[test]
    fn dangling_job_ref_is_allowed_on_send() {
        let f = fixture();
        let ghost = JobId::new();
        let sent = f
            .db
            .send_message(f.employer, f.freelancer, "about that job", Some(ghost), false)
            .unwrap();
        assert_eq!(sent.job, Some(ghost));
    }

    #[test]
    fn mark_read_requires_receiver() {
        let f = fixture();
        let m = f
            .db
            .send_message(f.employer, f.freelancer, "read me", None, false)
            .unwrap();

        // Sender cannot mark their own message read.
        assert!(matches!(
            f.db.mark_read(m.id, f.employer),
            Err(StoreError::Authorization(_))
        ));

        let updated = f.db.mark_read(m.id, f.freelancer).unwrap();
        assert!(updated.read);
    }

    #[test]
    fn mark_read_is_idempotent() {
        let f = fixture();
        let m = f
            .db
            .send_message(f.employer, f.freelancer, "read me twice", None, false)
            .unwrap();

        let first = f.db.mark_read(m.id, f.freelancer).unwrap();
        let second = f.db.mark_read(m.id, f.freelancer).unwrap();
        assert_eq!(first, second);
        assert_eq!(f.db.unread_count(f.freelancer).unwrap(), 0);
    }

    #[test]
    fn bulk_mark_read_returns_changed_count() {
        let f = fixture();
        for text in ["a", "b", "c"] {
            f.db.send_message(f.employer, f.freelancer, text, None, false)
                .unwrap();
        }
        f.db.send_message(f.freelancer, f.employer, "reply", None, false)
            .unwrap();

        let changed = f
            .db
            .mark_conversation_read(f.employer, f.freelancer)
            .unwrap();
        assert_eq!(changed, 3);

        // Second run changes nothing.
        let changed = f
            .db
            .mark_conversation_read(f.employer, f.freelancer)
            .unwrap();
        assert_eq!(changed, 0);
    }

    #[test]
    fn delete_requires_sender() {
        let f = fixture();
        let m = f
            .db
            .send_message(f.freelancer, f.employer, "mine", None, false)
            .unwrap();

        // The receiver cannot delete the sender's message...
        assert!(matches!(
            f.db.delete_message(m.id, f.employer),
            Err(StoreError::Authorization(_))
        ));
        // ...and it remains visible to both parties.
        assert_eq!(
            f.db.conversation_between(f.freelancer, f.employer)
                .unwrap()
                .len(),
            1
        );

        let deleted = f.db.delete_message(m.id, f.freelancer).unwrap();
        assert_eq!(deleted.id, m.id);
        assert!(f
            .db
            .conversation_between(f.freelancer, f.employer)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn delete_missing_message_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.db.delete_message(MessageId::new(), f.employer),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn unread_count_tracks_receiver_only() {
        let f = fixture();
        f.db.send_message(f.employer, f.freelancer, "one", None, false)
            .unwrap();
        f.db.send_message(f.employer, f.freelancer, "two", None, false)
            .unwrap();
        f.db.send_message(f.freelancer, f.employer, "reply", None, false)
            .unwrap();

        assert_eq!(f.db.unread_count(f.freelancer).unwrap(), 2);
        assert_eq!(f.db.unread_count(f.employer).unwrap(), 1);
    }

    #[test]
    fn summaries_group_by_partner_with_unread_counts() {
        let f = fixture();
        let other = UserId::new();
        f.db.insert_user(&User {
            id: other,
            name: "Olga".into(),
            email: "olga@example.com".into(),
            role: Role::Employer,
            created_at: Utc::now(),
        })
        .unwrap();

        f.db.send_message(f.employer, f.freelancer, "hello", None, false)
            .unwrap();
        f.db.send_message(f.freelancer, f.employer, "hi back", None, false)
            .unwrap();
        f.db.send_message(other, f.freelancer, "new offer", None, false)
            .unwrap();

        let summaries = f.db.conversations_for(f.freelancer).unwrap();
        assert_eq!(summaries.len(), 2);

        // Most recent partner first.
        assert_eq!(summaries[0].partner_id, other);
        assert_eq!(summaries[0].partner_name, "Olga");
        assert_eq!(summaries[0].unread_count, 1);
        assert_eq!(summaries[0].last_message.content, "new offer");

        assert_eq!(summaries[1].partner_id, f.employer);
        assert_eq!(summaries[1].unread_count, 1);
        assert_eq!(summaries[1].last_message.content, "hi back");
    }
}
