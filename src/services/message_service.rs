use crate::error::{AppError, AppResult};
use crate::models::{Attachment, Conversation, Coordinates, Message, MessageType};
use crate::realtime::events::ClientEvent;
use crate::realtime::fanout::FanoutService;
use crate::repository::{ConversationRepository, MessagePage, MessageRepository};
use crate::services::validation::{self, AccessLevel, MessageOp};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Message use cases: sends, transitions, reactions, read tracking and
/// history pagination. Persist-then-fanout throughout; a failed fan-out never
/// fails the write.
pub struct MessageService {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
    fanout: Arc<FanoutService>,
    max_page_size: usize,
}

impl MessageService {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageRepository>,
        fanout: Arc<FanoutService>,
        max_page_size: usize,
    ) -> Self {
        Self {
            conversations,
            messages,
            fanout,
            max_page_size,
        }
    }

    pub async fn send_text(
        &self,
        caller: Uuid,
        conversation_id: Uuid,
        content: &str,
    ) -> AppResult<Message> {
        let conversation = self.writable_conversation(caller, conversation_id).await?;
        let message = Message::create_text(conversation_id, caller, content)?;
        self.persist_and_announce(conversation, message).await
    }

    pub async fn send_media(
        &self,
        caller: Uuid,
        conversation_id: Uuid,
        kind: MessageType,
        caption: Option<&str>,
        attachments: Vec<Attachment>,
    ) -> AppResult<Message> {
        let conversation = self.writable_conversation(caller, conversation_id).await?;
        let message = Message::create_media(conversation_id, caller, kind, caption, attachments)?;
        self.persist_and_announce(conversation, message).await
    }

    pub async fn send_location(
        &self,
        caller: Uuid,
        conversation_id: Uuid,
        coordinates: Coordinates,
        caption: Option<&str>,
    ) -> AppResult<Message> {
        let conversation = self.writable_conversation(caller, conversation_id).await?;
        let message = Message::create_location(conversation_id, caller, coordinates, caption)?;
        self.persist_and_announce(conversation, message).await
    }

    pub async fn send_reply(
        &self,
        caller: Uuid,
        conversation_id: Uuid,
        content: &str,
        reply_to_message_id: Uuid,
    ) -> AppResult<Message> {
        let conversation = self.writable_conversation(caller, conversation_id).await?;
        let parent = self
            .messages
            .find_by_id(reply_to_message_id)
            .await?
            .filter(|m| m.conversation_id == conversation_id)
            .ok_or(AppError::NotFound)?;
        let message = Message::create_reply(conversation_id, caller, content, parent.id)?;
        self.persist_and_announce(conversation, message).await
    }

    /// System messages have no sender and bypass participant checks; they are
    /// emitted by the domain itself (joins, renames and the like).
    pub async fn send_system(&self, conversation_id: Uuid, content: &str) -> AppResult<Message> {
        let conversation = self.load_conversation(conversation_id).await?;
        let message = Message::create_system(conversation_id, content)?;
        self.persist_and_announce(conversation, message).await
    }

    pub async fn edit(
        &self,
        caller: Uuid,
        message_id: Uuid,
        new_content: &str,
    ) -> AppResult<Message> {
        let message = self.load_message(message_id).await?;
        let conversation = self.writable_home(&message).await?;
        validation::validate_message_operation(&message, caller, MessageOp::Edit)?;
        let message = message.edit(new_content, Utc::now())?;
        self.messages.update(&message).await?;

        self.fanout
            .publish(
                ClientEvent::MessageEdited {
                    conversation_id: message.conversation_id,
                    message_id: message.id,
                    version: message.version,
                },
                &conversation.active_participant_ids(),
            )
            .await;
        Ok(message)
    }

    pub async fn delete(&self, caller: Uuid, message_id: Uuid) -> AppResult<Message> {
        let message = self.load_message(message_id).await?;
        let conversation = self.writable_home(&message).await?;
        validation::validate_message_operation(&message, caller, MessageOp::Delete)?;
        let message = message.delete(Utc::now())?;
        self.messages.update(&message).await?;

        self.fanout
            .publish(
                ClientEvent::MessageDeleted {
                    conversation_id: message.conversation_id,
                    message_id: message.id,
                },
                &conversation.active_participant_ids(),
            )
            .await;
        Ok(message)
    }

    pub async fn add_reaction(
        &self,
        caller: Uuid,
        message_id: Uuid,
        emoji: &str,
    ) -> AppResult<Message> {
        self.toggle_reaction(caller, message_id, emoji, true).await
    }

    pub async fn remove_reaction(
        &self,
        caller: Uuid,
        message_id: Uuid,
        emoji: &str,
    ) -> AppResult<Message> {
        self.toggle_reaction(caller, message_id, emoji, false).await
    }

    async fn toggle_reaction(
        &self,
        caller: Uuid,
        message_id: Uuid,
        emoji: &str,
        added: bool,
    ) -> AppResult<Message> {
        let message = self.load_message(message_id).await?;
        let conversation = self.load_conversation(message.conversation_id).await?;
        validation::validate_conversation_access(&conversation, caller, AccessLevel::Write)?;

        let next = if added {
            message.add_reaction(emoji, caller)?
        } else {
            message.remove_reaction(emoji, caller)?
        };
        // Idempotent repeats succeed without another write or event.
        if next == message {
            return Ok(next);
        }
        self.messages.update(&next).await?;
        self.fanout
            .publish(
                ClientEvent::ReactionUpdated {
                    conversation_id: next.conversation_id,
                    message_id: next.id,
                    emoji: emoji.to_string(),
                    user_id: caller,
                    added,
                },
                &conversation.active_participant_ids(),
            )
            .await;
        Ok(next)
    }

    /// Recipient-side delivery receipt. No client event is defined for
    /// delivery; the timestamp only gates the read transition.
    pub async fn mark_delivered(&self, caller: Uuid, message_id: Uuid) -> AppResult<Message> {
        let message = self.load_message(message_id).await?;
        let conversation = self.load_conversation(message.conversation_id).await?;
        validation::validate_conversation_access(&conversation, caller, AccessLevel::Read)?;
        let message = message.mark_delivered(Utc::now())?;
        self.messages.update(&message).await?;
        Ok(message)
    }

    /// Marks a batch of messages read and emits one `message.read` receipt.
    /// All transitions are computed before anything is written, so a bad id
    /// anywhere in the batch leaves every message untouched.
    pub async fn mark_read(
        &self,
        caller: Uuid,
        conversation_id: Uuid,
        message_ids: &[Uuid],
    ) -> AppResult<()> {
        let conversation = self.load_conversation(conversation_id).await?;
        validation::validate_conversation_access(&conversation, caller, AccessLevel::Read)?;

        let read_at = Utc::now();
        let mut updated = Vec::with_capacity(message_ids.len());
        for message_id in message_ids {
            let message = self
                .messages
                .find_by_id(*message_id)
                .await?
                .filter(|m| m.conversation_id == conversation_id)
                .ok_or(AppError::NotFound)?;
            updated.push(message.mark_read(read_at)?);
        }
        for message in &updated {
            self.messages.update(message).await?;
        }

        self.fanout
            .publish(
                ClientEvent::MessageRead {
                    conversation_id,
                    message_ids: message_ids.to_vec(),
                    read_by_user_id: caller,
                    read_at,
                },
                &conversation.active_participant_ids(),
            )
            .await;
        Ok(())
    }

    /// Cursor-paginated history, newest first. The limit is clamped to the
    /// configured cap.
    pub async fn get_messages(
        &self,
        caller: Uuid,
        conversation_id: Uuid,
        cursor: Option<Uuid>,
        limit: usize,
    ) -> AppResult<MessagePage> {
        let conversation = self.load_conversation(conversation_id).await?;
        validation::validate_conversation_access(&conversation, caller, AccessLevel::Read)?;
        let limit = limit.clamp(1, self.max_page_size);
        self.messages.find_page(conversation_id, cursor, limit).await
    }

    pub async fn unread_count(&self, caller: Uuid, conversation_id: Uuid) -> AppResult<u64> {
        let conversation = self.load_conversation(conversation_id).await?;
        validation::validate_conversation_access(&conversation, caller, AccessLevel::Read)?;
        self.messages.count_unread(conversation_id, caller).await
    }

    /// Ephemeral typing relay to the other participants; nothing persists.
    pub async fn typing(
        &self,
        caller: Uuid,
        conversation_id: Uuid,
        started: bool,
    ) -> AppResult<()> {
        let conversation = self.load_conversation(conversation_id).await?;
        validation::validate_conversation_access(&conversation, caller, AccessLevel::Read)?;

        let event = if started {
            ClientEvent::TypingStart {
                conversation_id,
                user_id: caller,
            }
        } else {
            ClientEvent::TypingStop {
                conversation_id,
                user_id: caller,
            }
        };
        let targets: Vec<Uuid> = conversation
            .active_participant_ids()
            .into_iter()
            .filter(|id| *id != caller)
            .collect();
        self.fanout.publish(event, &targets).await;
        Ok(())
    }

    async fn writable_conversation(
        &self,
        caller: Uuid,
        conversation_id: Uuid,
    ) -> AppResult<Conversation> {
        let conversation = self.load_conversation(conversation_id).await?;
        validation::validate_conversation_access(&conversation, caller, AccessLevel::Write)?;
        Ok(conversation)
    }

    /// The conversation a message lives in. Message mutations stop once that
    /// conversation reaches its terminal status, even for the sender.
    async fn writable_home(&self, message: &Message) -> AppResult<Conversation> {
        let conversation = self.load_conversation(message.conversation_id).await?;
        if conversation.is_deleted() {
            return Err(AppError::InvalidStateTransition(
                "conversation has been deleted",
            ));
        }
        Ok(conversation)
    }

    async fn persist_and_announce(
        &self,
        conversation: Conversation,
        message: Message,
    ) -> AppResult<Message> {
        self.messages.save(&message).await?;
        let conversation = conversation.touch(message.sent_at);
        self.conversations.update(&conversation).await?;

        self.fanout
            .publish(
                ClientEvent::MessageReceived {
                    conversation_id: message.conversation_id,
                    message: message.clone(),
                },
                &conversation.active_participant_ids(),
            )
            .await;
        Ok(message)
    }

    async fn load_conversation(&self, conversation_id: Uuid) -> AppResult<Conversation> {
        self.conversations
            .find_by_id(conversation_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn load_message(&self, message_id: Uuid) -> AppResult<Message> {
        self.messages
            .find_by_id(message_id)
            .await?
            .ok_or(AppError::NotFound)
    }
}
