//! Real-time delivery façade.
//!
//! Both REST handlers and gateway handlers fan persisted-state changes out
//! to online peers through this one entry point. An offline peer is not an
//! error: they will see the true state on their next fetch, so a miss is
//! only logged.

use std::sync::Arc;

use tracing::debug;

use hirelink_shared::protocol::ServerEvent;
use hirelink_shared::types::UserId;

use crate::presence::PresenceRegistry;

#[derive(Clone)]
pub struct Delivery {
    presence: Arc<PresenceRegistry>,
}

impl Delivery {
    pub fn new(presence: Arc<PresenceRegistry>) -> Self {
        Self { presence }
    }

    /// Push an event onto `user`'s live connection.
    ///
    /// Returns whether the event was actually queued: false when the user is
    /// offline or their connection is mid-teardown.
    pub async fn push_to_user(&self, user: UserId, event: ServerEvent) -> bool {
        match self.presence.lookup(user).await {
            Some(handle) => {
                let queued = handle.push(event);
                if !queued {
                    debug!(user = %user.short(), "connection closing, push dropped");
                }
                queued
            }
            None => {
                debug!(user = %user.short(), "peer offline, skipping real-time push");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::ConnectionHandle;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    #[tokio::test]
    async fn push_reaches_online_user() {
        let presence = Arc::new(PresenceRegistry::new());
        let delivery = Delivery::new(presence.clone());
        let user = UserId::new();

        let (tx, mut rx) = mpsc::unbounded_channel();
        presence
            .register(user, ConnectionHandle::new(Uuid::new_v4(), "Frida".into(), tx))
            .await;

        let delivered = delivery
            .push_to_user(
                user,
                ServerEvent::UserStoppedTyping { user_id: user },
            )
            .await;

        assert!(delivered);
        assert!(matches!(
            rx.try_recv(),
            Ok(ServerEvent::UserStoppedTyping { .. })
        ));
    }

    #[tokio::test]
    async fn push_to_offline_user_is_a_silent_miss() {
        let presence = Arc::new(PresenceRegistry::new());
        let delivery = Delivery::new(presence);

        let delivered = delivery
            .push_to_user(
                UserId::new(),
                ServerEvent::UserStoppedTyping {
                    user_id: UserId::new(),
                },
            )
            .await;

        assert!(!delivered);
    }

    #[tokio::test]
    async fn push_to_closed_connection_reports_miss() {
        let presence = Arc::new(PresenceRegistry::new());
        let delivery = Delivery::new(presence.clone());
        let user = UserId::new();

        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        presence
            .register(user, ConnectionHandle::new(Uuid::new_v4(), "Gone".into(), tx))
            .await;

        let delivered = delivery
            .push_to_user(user, ServerEvent::UserStoppedTyping { user_id: user })
            .await;
        assert!(!delivered);
    }
}
