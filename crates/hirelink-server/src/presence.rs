//! Presence tracking for gateway connections.
//!
//! Maintains the process-wide map of authenticated user identity to live
//! connection handle, plus per-conversation room membership. The registry is
//! created once at startup and injected into both the gateway and the REST
//! handlers that need real-time delivery.

use std::collections::{HashMap, HashSet};

use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use hirelink_shared::protocol::ServerEvent;
use hirelink_shared::types::UserId;

/// Unique id of one physical connection, used to tell a stale handle from
/// the live one during rapid reconnects.
pub type ConnectionId = Uuid;

/// Sending side of one gateway connection.
///
/// Events pushed here are queued on the connection's outbound channel and
/// written to the socket by its writer task, so a slow peer never blocks the
/// pusher.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub connection_id: ConnectionId,
    pub user_name: String,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    pub fn new(
        connection_id: ConnectionId,
        user_name: String,
        tx: mpsc::UnboundedSender<ServerEvent>,
    ) -> Self {
        Self {
            connection_id,
            user_name,
            tx,
        }
    }

    /// Queue an event for this connection. Returns false when the
    /// connection has already gone away.
    pub fn push(&self, event: ServerEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

#[derive(Default)]
struct Inner {
    online: HashMap<UserId, ConnectionHandle>,
    rooms: HashMap<String, HashSet<UserId>>,
}

/// Tracks all currently connected users.
#[derive(Default)]
pub struct PresenceRegistry {
    inner: RwLock<Inner>,
}

impl PresenceRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly authenticated connection.
    ///
    /// At most one connection per user: a second registration replaces the
    /// first and returns the replaced handle (last-connect-wins), whose
    /// outbound channel the caller should let drop.
    pub async fn register(&self, user: UserId, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let replaced = self.inner.write().await.online.insert(user, handle);
        debug!(user = %user.short(), replaced = replaced.is_some(), "user connected");
        replaced
    }

    /// Remove a user's presence entry unconditionally.
    pub async fn unregister(&self, user: UserId) -> Option<ConnectionHandle> {
        let removed = self.inner.write().await.online.remove(&user);
        if removed.is_some() {
            debug!(user = %user.short(), "user disconnected");
        }
        removed
    }

    /// Remove a user's presence entry only if it still belongs to the given
    /// connection. A reconnect that already replaced the mapping must not be
    /// knocked back offline by the old connection's teardown.
    pub async fn unregister_connection(&self, user: UserId, connection_id: ConnectionId) -> bool {
        let mut inner = self.inner.write().await;
        match inner.online.get(&user) {
            Some(handle) if handle.connection_id == connection_id => {
                inner.online.remove(&user);
                for members in inner.rooms.values_mut() {
                    members.remove(&user);
                }
                inner.rooms.retain(|_, members| !members.is_empty());
                debug!(user = %user.short(), "user disconnected");
                true
            }
            _ => false,
        }
    }

    /// Look up the live connection for a user, if any.
    pub async fn lookup(&self, user: UserId) -> Option<ConnectionHandle> {
        self.inner.read().await.online.get(&user).cloned()
    }

    /// Whether the user currently has a live connection.
    pub async fn is_online(&self, user: UserId) -> bool {
        self.inner.read().await.online.contains_key(&user)
    }

    /// Snapshot of all online user identities.
    pub async fn online_users(&self) -> Vec<UserId> {
        self.inner.read().await.online.keys().copied().collect()
    }

    /// Queue an event on every connection except `except`.
    pub async fn broadcast_except(&self, except: UserId, event: ServerEvent) {
        let inner = self.inner.read().await;
        for (user, handle) in inner.online.iter() {
            if *user != except {
                handle.push(event.clone());
            }
        }
    }

    /// Queue an event on every connection.
    pub async fn broadcast_all(&self, event: ServerEvent) {
        let inner = self.inner.read().await;
        for handle in inner.online.values() {
            handle.push(event.clone());
        }
    }

    /// Add a user to a conversation room.
    pub async fn join_room(&self, room: &str, user: UserId) {
        self.inner
            .write()
            .await
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(user);
        debug!(user = %user.short(), room, "joined conversation room");
    }

    /// Remove a user from a conversation room.
    pub async fn leave_room(&self, room: &str, user: UserId) {
        let mut inner = self.inner.write().await;
        if let Some(members) = inner.rooms.get_mut(room) {
            members.remove(&user);
            if members.is_empty() {
                inner.rooms.remove(room);
            }
        }
        debug!(user = %user.short(), room, "left conversation room");
    }

    /// Current members of a conversation room.
    pub async fn room_members(&self, room: &str) -> Vec<UserId> {
        self.inner
            .read()
            .await
            .rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }
}
