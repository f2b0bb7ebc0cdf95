use crate::error::{AppError, AppResult};
use crate::models::{Conversation, ConversationKind};
use crate::realtime::events::ClientEvent;
use crate::realtime::fanout::FanoutService;
use crate::repository::ConversationRepository;
use crate::services::validation::{self, AccessLevel};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Conversation use cases. Each call validates, computes a new aggregate
/// value, persists it, then fans out `conversation.updated` to the active
/// participants, in that order: persistence is the source of truth and
/// realtime delivery stays best-effort.
pub struct ConversationService {
    conversations: Arc<dyn ConversationRepository>,
    fanout: Arc<FanoutService>,
}

impl ConversationService {
    pub fn new(conversations: Arc<dyn ConversationRepository>, fanout: Arc<FanoutService>) -> Self {
        Self {
            conversations,
            fanout,
        }
    }

    pub async fn create_private(&self, caller: Uuid, other: Uuid) -> AppResult<Conversation> {
        validation::validate_participants(&[caller, other], ConversationKind::Private)?;
        let conversation = Conversation::create_private(caller, other, caller)?;
        self.conversations.save(&conversation).await?;
        self.notify_updated(&conversation).await;
        Ok(conversation)
    }

    pub async fn create_group(
        &self,
        caller: Uuid,
        title: &str,
        participant_ids: &[Uuid],
    ) -> AppResult<Conversation> {
        let conversation = Conversation::create_group(title, participant_ids, caller)?;
        self.conversations.save(&conversation).await?;
        self.notify_updated(&conversation).await;
        Ok(conversation)
    }

    pub async fn add_participant(
        &self,
        caller: Uuid,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Conversation> {
        let conversation = self.load(conversation_id).await?;
        let conversation = conversation.add_participant(user_id, caller)?;
        self.conversations.update(&conversation).await?;
        self.notify_updated(&conversation).await;
        Ok(conversation)
    }

    pub async fn remove_participant(
        &self,
        caller: Uuid,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Conversation> {
        let conversation = self.load(conversation_id).await?;
        let conversation = conversation.remove_participant(user_id, caller)?;
        self.conversations.update(&conversation).await?;
        // The removed user is told too, so their client can drop the room.
        let mut targets = conversation.active_participant_ids();
        targets.push(user_id);
        self.fanout
            .publish(
                ClientEvent::ConversationUpdated {
                    conversation_id: conversation.id,
                },
                &targets,
            )
            .await;
        Ok(conversation)
    }

    pub async fn rename(
        &self,
        caller: Uuid,
        conversation_id: Uuid,
        title: &str,
    ) -> AppResult<Conversation> {
        let conversation = self.load(conversation_id).await?;
        validation::validate_conversation_access(&conversation, caller, AccessLevel::Admin)?;
        let conversation = conversation.update_title(title)?;
        self.conversations.update(&conversation).await?;
        self.notify_updated(&conversation).await;
        Ok(conversation)
    }

    pub async fn archive(&self, caller: Uuid, conversation_id: Uuid) -> AppResult<Conversation> {
        let conversation = self.load(conversation_id).await?;
        validation::validate_conversation_access(&conversation, caller, AccessLevel::Write)?;
        let conversation = conversation.archive()?;
        self.conversations.update(&conversation).await?;
        self.notify_updated(&conversation).await;
        Ok(conversation)
    }

    pub async fn unarchive(&self, caller: Uuid, conversation_id: Uuid) -> AppResult<Conversation> {
        let conversation = self.load(conversation_id).await?;
        validation::validate_conversation_access(&conversation, caller, AccessLevel::Write)?;
        let conversation = conversation.unarchive()?;
        self.conversations.update(&conversation).await?;
        self.notify_updated(&conversation).await;
        Ok(conversation)
    }

    /// Terminal status transition; history is preserved, nothing is removed.
    pub async fn delete(&self, caller: Uuid, conversation_id: Uuid) -> AppResult<Conversation> {
        let conversation = self.load(conversation_id).await?;
        validation::validate_conversation_access(&conversation, caller, AccessLevel::Admin)?;
        let conversation = conversation.delete()?;
        self.conversations.update(&conversation).await?;
        self.notify_updated(&conversation).await;
        Ok(conversation)
    }

    /// Advances the caller's read watermark for unread counts.
    pub async fn mark_read(&self, caller: Uuid, conversation_id: Uuid) -> AppResult<Conversation> {
        let conversation = self.load(conversation_id).await?;
        let conversation = conversation.mark_read_by(caller, Utc::now())?;
        self.conversations.update(&conversation).await?;
        Ok(conversation)
    }

    pub async fn get(&self, caller: Uuid, conversation_id: Uuid) -> AppResult<Conversation> {
        let conversation = self.load(conversation_id).await?;
        validation::validate_conversation_access(&conversation, caller, AccessLevel::Read)?;
        Ok(conversation)
    }

    pub async fn list(&self, caller: Uuid) -> AppResult<Vec<Conversation>> {
        self.conversations.find_by_participant(caller).await
    }

    async fn load(&self, conversation_id: Uuid) -> AppResult<Conversation> {
        self.conversations
            .find_by_id(conversation_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn notify_updated(&self, conversation: &Conversation) {
        self.fanout
            .publish(
                ClientEvent::ConversationUpdated {
                    conversation_id: conversation.id,
                },
                &conversation.active_participant_ids(),
            )
            .await;
    }
}
