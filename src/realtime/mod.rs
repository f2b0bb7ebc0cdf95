use crate::realtime::events::ClientEvent;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

pub mod events;
pub mod fanout;
pub mod session;

/// Handle to one live client connection. Delivery is bounded and non-blocking:
/// a full buffer drops the event, a closed receiver prunes the handle.
#[derive(Clone)]
pub struct ConnectionHandle {
    pub id: Uuid,
    sender: mpsc::Sender<ClientEvent>,
}

impl ConnectionHandle {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (
            Self {
                id: Uuid::new_v4(),
                sender: tx,
            },
            rx,
        )
    }
}

/// Process-local directory of live connections: user id -> connection handles,
/// plus a conversation-room membership view. Owned by the process, injected
/// into everything that needs it; mutations are atomic with respect to
/// concurrent reads since a publish and a disconnect can race.
#[derive(Clone, Default)]
pub struct SessionDirectory {
    inner: Arc<RwLock<DirectoryInner>>,
}

#[derive(Default)]
struct DirectoryInner {
    connections: HashMap<Uuid, Vec<ConnectionHandle>>,
    rooms: HashMap<Uuid, HashSet<Uuid>>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_connection(&self, user_id: Uuid, handle: ConnectionHandle) {
        let mut guard = self.inner.write().await;
        guard.connections.entry(user_id).or_default().push(handle);
    }

    /// Drops one handle. When it was the user's last, the user goes offline
    /// for fan-out purposes and leaves every room.
    pub async fn unregister_connection(&self, user_id: Uuid, connection_id: Uuid) {
        let mut guard = self.inner.write().await;
        let last_gone = match guard.connections.get_mut(&user_id) {
            Some(handles) => {
                handles.retain(|h| h.id != connection_id);
                handles.is_empty()
            }
            None => false,
        };
        if last_gone {
            guard.connections.remove(&user_id);
            for members in guard.rooms.values_mut() {
                members.remove(&user_id);
            }
            guard.rooms.retain(|_, members| !members.is_empty());
        }
    }

    pub async fn join_room(&self, conversation_id: Uuid, user_id: Uuid) {
        let mut guard = self.inner.write().await;
        guard.rooms.entry(conversation_id).or_default().insert(user_id);
    }

    pub async fn leave_room(&self, conversation_id: Uuid, user_id: Uuid) {
        let mut guard = self.inner.write().await;
        if let Some(members) = guard.rooms.get_mut(&conversation_id) {
            members.remove(&user_id);
            if members.is_empty() {
                guard.rooms.remove(&conversation_id);
            }
        }
    }

    pub async fn room_members(&self, conversation_id: Uuid) -> Vec<Uuid> {
        let guard = self.inner.read().await;
        guard
            .rooms
            .get(&conversation_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        let guard = self.inner.read().await;
        guard.connections.contains_key(&user_id)
    }

    /// Pushes an event to every local connection for the user, pruning closed
    /// handles on the way. Returns the number of connections reached.
    pub async fn push_to_user(&self, user_id: Uuid, event: &ClientEvent) -> usize {
        let mut guard = self.inner.write().await;
        let Some(handles) = guard.connections.get_mut(&user_id) else {
            return 0;
        };
        let mut delivered = 0;
        handles.retain(|handle| match handle.sender.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(%user_id, connection_id = %handle.id, event_type = event.event_type(),
                    "connection buffer full, dropping event");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        if handles.is_empty() {
            guard.connections.remove(&user_id);
        }
        delivered
    }
}
