use crate::error::{AppError, AppResult};
use crate::realtime::events::ClientEvent;
use crate::realtime::{ConnectionHandle, SessionDirectory};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticated,
    Joined,
    Disconnected,
}

/// Lifecycle of one client connection:
/// `Connecting -> Authenticated -> Joined -> Disconnected`.
///
/// Authentication registers the connection in the process-local directory;
/// disconnecting unregisters it and is terminal. The eventual disconnect is
/// the only cancellation signal the realtime layer knows about.
pub struct Connection {
    pub id: Uuid,
    state: ConnectionState,
    user_id: Option<Uuid>,
    directory: SessionDirectory,
    handle: ConnectionHandle,
}

impl Connection {
    /// Opens a connection in the `Connecting` state. The returned receiver is
    /// the client's event stream.
    pub fn open(
        directory: SessionDirectory,
        buffer: usize,
    ) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (handle, rx) = ConnectionHandle::new(buffer);
        (
            Self {
                id: handle.id,
                state: ConnectionState::Connecting,
                user_id: None,
                directory,
                handle,
            },
            rx,
        )
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub async fn authenticate(&mut self, user_id: Uuid) -> AppResult<()> {
        if self.state != ConnectionState::Connecting {
            return Err(AppError::InvalidStateTransition(
                "connection already authenticated or closed",
            ));
        }
        self.directory
            .register_connection(user_id, self.handle.clone())
            .await;
        self.user_id = Some(user_id);
        self.state = ConnectionState::Authenticated;
        Ok(())
    }

    /// Joins one room per conversation the user participates in.
    pub async fn join_conversations(&mut self, conversation_ids: &[Uuid]) -> AppResult<()> {
        let user_id = match (self.state, self.user_id) {
            (ConnectionState::Authenticated | ConnectionState::Joined, Some(user_id)) => user_id,
            _ => {
                return Err(AppError::InvalidStateTransition(
                    "connection must be authenticated before joining rooms",
                ))
            }
        };
        for conversation_id in conversation_ids {
            self.directory.join_room(*conversation_id, user_id).await;
        }
        self.state = ConnectionState::Joined;
        Ok(())
    }

    /// Drops the room-view entries for the given conversations, e.g. when the
    /// client closes them or the user is removed. The connection stays up.
    pub async fn leave_conversations(&mut self, conversation_ids: &[Uuid]) -> AppResult<()> {
        let user_id = match (self.state, self.user_id) {
            (ConnectionState::Authenticated | ConnectionState::Joined, Some(user_id)) => user_id,
            _ => {
                return Err(AppError::InvalidStateTransition(
                    "connection must be authenticated before leaving rooms",
                ))
            }
        };
        for conversation_id in conversation_ids {
            self.directory.leave_room(*conversation_id, user_id).await;
        }
        Ok(())
    }

    /// Terminal. The user stays a participant for persistence purposes; only
    /// the live-connection view changes.
    pub async fn disconnect(&mut self) -> AppResult<()> {
        if self.state == ConnectionState::Disconnected {
            return Err(AppError::InvalidStateTransition(
                "connection already disconnected",
            ));
        }
        if let Some(user_id) = self.user_id {
            self.directory.unregister_connection(user_id, self.id).await;
        }
        self.state = ConnectionState::Disconnected;
        Ok(())
    }
}
