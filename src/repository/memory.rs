use crate::error::{AppError, AppResult};
use crate::models::{Conversation, Message};
use crate::repository::{ConversationRepository, MessagePage, MessageRepository};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory store backing both repository traits. Created at process start
/// and injected; all access goes through the lock, which is the serialization
/// point for concurrent writers.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    conversations: HashMap<Uuid, Conversation>,
    messages: HashMap<Uuid, Message>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationRepository for MemoryStore {
    async fn save(&self, conversation: &Conversation) -> AppResult<()> {
        let mut guard = self.inner.write().await;
        guard
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(())
    }

    async fn update(&self, conversation: &Conversation) -> AppResult<()> {
        let mut guard = self.inner.write().await;
        if !guard.conversations.contains_key(&conversation.id) {
            return Err(AppError::NotFound);
        }
        guard
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut guard = self.inner.write().await;
        guard.conversations.remove(&id).ok_or(AppError::NotFound)?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Conversation>> {
        let guard = self.inner.read().await;
        Ok(guard.conversations.get(&id).cloned())
    }

    async fn find_by_participant(&self, user_id: Uuid) -> AppResult<Vec<Conversation>> {
        let guard = self.inner.read().await;
        let mut out: Vec<Conversation> = guard
            .conversations
            .values()
            .filter(|c| !c.is_deleted() && c.is_active_participant(user_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn save(&self, message: &Message) -> AppResult<()> {
        let mut guard = self.inner.write().await;
        guard.messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn update(&self, message: &Message) -> AppResult<()> {
        let mut guard = self.inner.write().await;
        if !guard.messages.contains_key(&message.id) {
            return Err(AppError::NotFound);
        }
        guard.messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut guard = self.inner.write().await;
        guard.messages.remove(&id).ok_or(AppError::NotFound)?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Message>> {
        let guard = self.inner.read().await;
        Ok(guard.messages.get(&id).cloned())
    }

    async fn find_page(
        &self,
        conversation_id: Uuid,
        cursor: Option<Uuid>,
        limit: usize,
    ) -> AppResult<MessagePage> {
        let guard = self.inner.read().await;
        let mut rows: Vec<&Message> = guard
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .collect();
        // Newest first; id breaks sent_at ties so the order is total.
        rows.sort_by(|a, b| b.sent_at.cmp(&a.sent_at).then(b.id.cmp(&a.id)));

        let start = match cursor {
            None => 0,
            Some(cursor_id) => {
                let position = rows
                    .iter()
                    .position(|m| m.id == cursor_id)
                    .ok_or(AppError::NotFound)?;
                position + 1
            }
        };

        let remaining = &rows[start.min(rows.len())..];
        let has_more = remaining.len() > limit;
        let messages: Vec<Message> = remaining
            .iter()
            .take(limit)
            .map(|m| (*m).clone())
            .collect();
        let next_cursor = messages.last().map(|m| m.id);

        Ok(MessagePage {
            messages,
            next_cursor,
            has_more,
        })
    }

    async fn count_unread(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<u64> {
        let guard = self.inner.read().await;
        let conversation = guard
            .conversations
            .get(&conversation_id)
            .ok_or(AppError::NotFound)?;
        let watermark = conversation
            .participant(user_id)
            .and_then(|p| p.last_read_at);

        let count = guard
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .filter(|m| !m.is_deleted())
            .filter(|m| m.sender_id != Some(user_id))
            .filter(|m| watermark.map_or(true, |at| m.sent_at > at))
            .count();
        Ok(count as u64)
    }
}
