use crate::error::AppResult;
use crate::models::{Conversation, Message};
use async_trait::async_trait;
use uuid::Uuid;

pub mod memory;

pub use memory::MemoryStore;

/// One page of message history, newest first.
#[derive(Debug, Clone)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    /// Id of the last row actually returned; feed it back to continue paging.
    pub next_cursor: Option<Uuid>,
    pub has_more: bool,
}

/// Persistence seam for conversations. Implemented by an external collaborator;
/// [`MemoryStore`] is the in-process implementation used for wiring and tests.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn save(&self, conversation: &Conversation) -> AppResult<()>;
    async fn update(&self, conversation: &Conversation) -> AppResult<()>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Conversation>>;
    /// Conversations where the user is an active participant, most recent
    /// activity first. Deleted conversations are not listed.
    async fn find_by_participant(&self, user_id: Uuid) -> AppResult<Vec<Conversation>>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn save(&self, message: &Message) -> AppResult<()>;
    async fn update(&self, message: &Message) -> AppResult<()>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Message>>;
    /// Cursor pagination ordered by `(sent_at, id)` descending. The cursor is
    /// exclusive; `limit + 1` rows are inspected to derive `has_more` without
    /// a count query. An unknown cursor is `NotFound`.
    async fn find_page(
        &self,
        conversation_id: Uuid,
        cursor: Option<Uuid>,
        limit: usize,
    ) -> AppResult<MessagePage>;
    /// Messages newer than the user's read watermark, not sent by the user,
    /// tombstones excluded.
    async fn count_unread(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<u64>;
}
