//! The chat controller: everything a conversation view needs to drive.
//!
//! Owns the REST client, the (optional) gateway connection, the active
//! conversation, and the compose draft. All state mutation funnels through
//! here, so the UI layer stays a pure renderer.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, warn};

use hirelink_shared::protocol::{ClientEvent, ServerEvent};
use hirelink_shared::types::{ApplicationId, ApplicationStatus, MessageId, UserId};
use hirelink_store::Message;

use crate::api::{MessageApi, SendMessageRequest};
use crate::conversation::{normalize_stored, temp_id, Application, ChatMessage, Conversation};
use crate::error::ClientError;
use crate::gateway::GatewayClient;

/// External collaborator that owns application status transitions. The
/// controller calls it before persisting the in-chat status notice; the
/// marketplace CRUD layer is never reimplemented here.
pub trait ApplicationStatusUpdater {
    fn update_status(
        &self,
        application: ApplicationId,
        status: ApplicationStatus,
    ) -> impl std::future::Future<Output = Result<(), ClientError>> + Send;
}

/// Status updater backed by the marketplace REST API.
#[derive(Debug, Clone)]
pub struct HttpStatusUpdater {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpStatusUpdater {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }
}

impl ApplicationStatusUpdater for HttpStatusUpdater {
    async fn update_status(
        &self,
        application: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), ClientError> {
        let response = self
            .http
            .put(format!(
                "{}/api/applications/{application}/status",
                self.base_url
            ))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "status": status }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Api {
                status: response.status().as_u16(),
                message: "Status update failed".into(),
            });
        }
        Ok(())
    }
}

/// Drives one user's chat session.
pub struct ChatController<S: ApplicationStatusUpdater> {
    api: MessageApi,
    status_updater: S,
    viewer: UserId,
    gateway: Option<GatewayClient>,
    active: Option<Conversation>,
    draft: String,
    online: HashSet<UserId>,
    peer_typing: bool,
}

impl<S: ApplicationStatusUpdater> ChatController<S> {
    pub fn new(api: MessageApi, status_updater: S, viewer: UserId) -> Self {
        Self {
            api,
            status_updater,
            viewer,
            gateway: None,
            active: None,
            draft: String::new(),
            online: HashSet::new(),
            peer_typing: false,
        }
    }

    /// Attach a live gateway connection. Without one the controller still
    /// works; the user just sees updates on refetch only.
    pub fn set_gateway(&mut self, gateway: GatewayClient) {
        self.gateway = Some(gateway);
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.active.as_ref()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn is_online(&self, user: UserId) -> bool {
        self.online.contains(&user)
    }

    /// Whether the active counterpart is typing right now.
    pub fn peer_typing(&self) -> bool {
        self.peer_typing
    }

    /// Select a conversation: fetch its job-scoped history, assemble the
    /// timeline, and move gateway room membership over.
    ///
    /// A failed history fetch still leaves a usable (empty) conversation
    /// and returns the error for the UI to surface.
    pub async fn select_conversation(
        &mut self,
        application: &Application,
    ) -> Result<(), ClientError> {
        self.leave_active_room().await;

        let (history, fetch_error) = match self.api.job_messages(application.job_id).await {
            Ok(history) => (history, None),
            Err(e) => {
                warn!(error = %e, "history fetch failed, starting empty");
                (Vec::new(), Some(e))
            }
        };

        self.open_conversation(application, &history);

        if let Some(gateway) = self.gateway.as_mut() {
            if let Err(e) = gateway.join_conversation(application.counterpart_of(self.viewer)).await
            {
                warn!(error = %e, "failed to join conversation room");
            }
        }

        match fetch_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Pure assembly step of [`select_conversation`], usable on its own when
    /// the history is already at hand.
    pub fn open_conversation(&mut self, application: &Application, history: &[Message]) {
        self.active = Some(Conversation::assemble(application, self.viewer, history));
        self.peer_typing = false;
    }

    async fn leave_active_room(&mut self) {
        if let (Some(gateway), Some(conversation)) = (self.gateway.as_mut(), self.active.as_ref())
        {
            if let Err(e) = gateway.leave_conversation(conversation.counterpart).await {
                debug!(error = %e, "failed to leave conversation room");
            }
        }
    }

    /// Optimistic send pipeline.
    ///
    /// The draft is rendered immediately under a temporary id and cleared.
    /// On persistence the pending entry is swapped for the authoritative
    /// record and the gateway relay is fed the server id, so both delivery
    /// paths converge for deduplication on the peer. On failure the pending
    /// entry is removed and the draft restored.
    pub async fn send_draft(&mut self) -> Result<MessageId, ClientError> {
        let conversation = self.active.as_mut().ok_or(ClientError::NoActiveConversation)?;

        let text = self.draft.trim().to_string();
        if text.is_empty() {
            return Err(ClientError::EmptyDraft);
        }

        let pending_id = temp_id();
        conversation.push_pending(ChatMessage {
            id: pending_id.clone(),
            sender: self.viewer,
            receiver: conversation.counterpart,
            text: text.clone(),
            timestamp: Utc::now(),
            pending: true,
        });
        self.draft.clear();

        let request = SendMessageRequest {
            receiver_id: conversation.counterpart,
            content: text.clone(),
            job_id: Some(conversation.job_id),
            is_system: false,
        };

        match self.api.send_message(&request).await {
            Ok(saved) => {
                conversation.resolve_pending(&pending_id, &saved);
                self.relay_persisted(&saved).await;
                Ok(saved.id)
            }
            Err(e) => {
                conversation.remove(&pending_id);
                self.draft = text;
                Err(e)
            }
        }
    }

    /// Status-update-via-chat: drive the external collaborator, then mirror
    /// the normal send path with a system message.
    pub async fn update_status(&mut self, status: ApplicationStatus) -> Result<(), ClientError> {
        let conversation = self.active.as_ref().ok_or(ClientError::NoActiveConversation)?;
        let application_id = conversation.application_id;
        let receiver = conversation.counterpart;
        let job_id = conversation.job_id;

        self.status_updater
            .update_status(application_id, status)
            .await?;

        let saved = self
            .api
            .send_message(&SendMessageRequest {
                receiver_id: receiver,
                content: format!("Application status updated to: {status}"),
                job_id: Some(job_id),
                is_system: true,
            })
            .await?;

        if let Some(conversation) = self.active.as_mut() {
            conversation.push_entry(normalize_stored(&saved));
        }
        self.relay_persisted(&saved).await;

        Ok(())
    }

    /// Hard-delete one of the viewer's own messages, then drop it locally.
    pub async fn delete_message(&mut self, id: MessageId) -> Result<(), ClientError> {
        self.api.delete_message(id).await?;
        if let Some(conversation) = self.active.as_mut() {
            conversation.remove(&id.to_string());
        }
        Ok(())
    }

    /// Hide a message from this view only. Nothing is deleted anywhere.
    pub fn hide_message(&mut self, id: &str) {
        if let Some(conversation) = self.active.as_mut() {
            conversation.hide(id);
        }
    }

    /// Feed one decoded gateway event into client state.
    pub fn handle_event(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::ReceiveMessage(push) => {
                let Some(conversation) = self.active.as_mut() else {
                    debug!("push with no active conversation, dropped");
                    return;
                };
                let relevant = push.job_id == Some(conversation.job_id)
                    || push.sender_id == conversation.counterpart;
                if relevant {
                    conversation.apply_live(push);
                    if push.sender_id == conversation.counterpart {
                        self.peer_typing = false;
                    }
                } else {
                    debug!(sender = %push.sender_id.short(), "push for another conversation, dropped");
                }
            }

            ServerEvent::UserTyping { user_id, .. } => {
                if self
                    .active
                    .as_ref()
                    .is_some_and(|c| c.counterpart == *user_id)
                {
                    self.peer_typing = true;
                }
            }
            ServerEvent::UserStoppedTyping { user_id } => {
                if self
                    .active
                    .as_ref()
                    .is_some_and(|c| c.counterpart == *user_id)
                {
                    self.peer_typing = false;
                }
            }

            ServerEvent::OnlineUsers { users } => {
                self.online = users.iter().copied().collect();
            }
            ServerEvent::UserOnline { user_id, .. } => {
                self.online.insert(*user_id);
            }
            ServerEvent::UserOffline { user_id, .. } => {
                self.online.remove(user_id);
            }

            ServerEvent::MessageSent { delivered, .. } => {
                debug!(delivered, "send acknowledged by gateway");
            }
            ServerEvent::MessageReadReceipt { message_id, .. } => {
                debug!(message = %message_id, "read receipt");
            }
            ServerEvent::MessagesRead { count, .. } => {
                debug!(count, "bulk read receipt");
            }
            ServerEvent::MessageDeleted { message_id, .. } => {
                // The already-rendered copy stays; deletion does not retract
                // messages the viewer has seen.
                debug!(message = %message_id, "peer deleted a message");
            }
            ServerEvent::Error { message } => {
                warn!(message, "gateway error event");
            }
        }
    }

    /// Send typing indicators for the active conversation; silently does
    /// nothing without a gateway.
    pub async fn set_typing(&mut self, typing: bool) {
        let Some(conversation) = self.active.as_ref() else {
            return;
        };
        let receiver_id = conversation.counterpart;
        if let Some(gateway) = self.gateway.as_mut() {
            let event = if typing {
                ClientEvent::TypingStart { receiver_id }
            } else {
                ClientEvent::TypingStop { receiver_id }
            };
            if let Err(e) = gateway.send(&event).await {
                debug!(error = %e, "typing indicator not sent");
            }
        }
    }

    /// Tell the gateway a message was read so the sender gets a receipt.
    pub async fn acknowledge_read(&mut self, message: &Message) -> Result<(), ClientError> {
        self.api.mark_read(message.id).await?;
        if let Some(gateway) = self.gateway.as_mut() {
            let _ = gateway
                .send(&ClientEvent::MessageRead {
                    message_id: message.id,
                    sender_id: message.sender,
                })
                .await;
        }
        Ok(())
    }

    async fn relay_persisted(&mut self, saved: &Message) {
        if let Some(gateway) = self.gateway.as_mut() {
            let relay = ClientEvent::SendMessage {
                receiver_id: saved.receiver,
                content: saved.content.clone(),
                job_id: saved.job,
                message_id: Some(saved.id),
                is_system: saved.is_system,
            };
            if let Err(e) = gateway.send(&relay).await {
                // The peer still gets the message from history on next
                // fetch; the relay is latency sugar only.
                debug!(error = %e, "relay emit failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hirelink_shared::protocol::MessagePush;
    use hirelink_shared::types::JobId;

    struct NoopUpdater;

    impl ApplicationStatusUpdater for NoopUpdater {
        async fn update_status(
            &self,
            _application: ApplicationId,
            _status: ApplicationStatus,
        ) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn application() -> Application {
        Application {
            id: ApplicationId::new(),
            job_id: JobId::new(),
            job_title: "Build a parser".into(),
            freelancer_id: UserId::new(),
            freelancer_name: "Frida".into(),
            employer_id: UserId::new(),
            employer_name: "Edgar".into(),
            proposal: Some("I can do this".into()),
            bid: Some(500.0),
            status: ApplicationStatus::Pending,
            applied_at: Utc::now(),
        }
    }

    fn controller(viewer: UserId) -> ChatController<NoopUpdater> {
        ChatController::new(
            MessageApi::new("http://localhost:8080", "test-token"),
            NoopUpdater,
            viewer,
        )
    }

    fn push(app: &Application, sender: UserId, receiver: UserId, text: &str) -> MessagePush {
        MessagePush {
            message_id: hirelink_shared::types::MessageId::new(),
            sender_id: sender,
            sender_name: "Frida".into(),
            receiver_id: receiver,
            content: text.into(),
            job_id: Some(app.job_id),
            is_system: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn live_push_lands_in_active_conversation_once() {
        let app = application();
        let mut ctl = controller(app.employer_id);
        ctl.open_conversation(&app, &[]);

        let incoming = push(&app, app.freelancer_id, app.employer_id, "hello");
        ctl.handle_event(&ServerEvent::ReceiveMessage(incoming.clone()));
        ctl.handle_event(&ServerEvent::ReceiveMessage(incoming));

        // Proposal entry + exactly one copy of the pushed message.
        let conversation = ctl.active_conversation().unwrap();
        assert_eq!(conversation.entries().len(), 2);
    }

    #[test]
    fn push_for_other_conversation_is_ignored() {
        let app = application();
        let mut ctl = controller(app.employer_id);
        ctl.open_conversation(&app, &[]);

        let mut unrelated = push(&app, UserId::new(), app.employer_id, "spam?");
        unrelated.job_id = Some(JobId::new());
        ctl.handle_event(&ServerEvent::ReceiveMessage(unrelated));

        let conversation = ctl.active_conversation().unwrap();
        assert_eq!(conversation.entries().len(), 1); // proposal only
    }

    #[test]
    fn presence_events_track_online_set() {
        let app = application();
        let mut ctl = controller(app.employer_id);
        let peer = app.freelancer_id;

        ctl.handle_event(&ServerEvent::OnlineUsers { users: vec![peer] });
        assert!(ctl.is_online(peer));

        ctl.handle_event(&ServerEvent::UserOffline {
            user_id: peer,
            name: "Frida".into(),
        });
        assert!(!ctl.is_online(peer));

        ctl.handle_event(&ServerEvent::UserOnline {
            user_id: peer,
            name: "Frida".into(),
        });
        assert!(ctl.is_online(peer));
    }

    #[test]
    fn typing_indicator_follows_counterpart_only() {
        let app = application();
        let mut ctl = controller(app.employer_id);
        ctl.open_conversation(&app, &[]);

        // Someone else typing changes nothing.
        ctl.handle_event(&ServerEvent::UserTyping {
            user_id: UserId::new(),
            name: "Other".into(),
        });
        assert!(!ctl.peer_typing());

        ctl.handle_event(&ServerEvent::UserTyping {
            user_id: app.freelancer_id,
            name: "Frida".into(),
        });
        assert!(ctl.peer_typing());

        // A message from the counterpart clears the indicator.
        ctl.handle_event(&ServerEvent::ReceiveMessage(push(
            &app,
            app.freelancer_id,
            app.employer_id,
            "done typing",
        )));
        assert!(!ctl.peer_typing());
    }

    #[test]
    fn hide_message_filters_the_local_view() {
        let app = application();
        let mut ctl = controller(app.freelancer_id);
        ctl.open_conversation(&app, &[]);

        let proposal_id = format!("application_{}", app.id);
        ctl.hide_message(&proposal_id);

        let conversation = ctl.active_conversation().unwrap();
        assert!(conversation.visible_entries().is_empty());
        assert_eq!(conversation.entries().len(), 1);
    }
}
