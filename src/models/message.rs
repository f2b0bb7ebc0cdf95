use crate::error::{AppError, AppResult};
use crate::models::{MessageContent, ReactionSet};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const EDIT_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Location,
    Contact,
    Sticker,
    Gif,
    System,
}

impl MessageType {
    /// Media kinds require at least one attachment.
    pub fn requires_attachment(&self) -> bool {
        matches!(
            self,
            Self::Image | Self::Video | Self::Audio | Self::Document | Self::Sticker | Self::Gif
        )
    }
}

/// `Deleted` is a user-initiated redaction and deliberately distinct from
/// `Failed`, which only ever means a delivery failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub file_name: String,
    pub file_type: Option<String>,
    pub file_size: i64,
    pub storage_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Immutable message aggregate. Each operation returns a new value reflecting
/// exactly one state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    /// `None` only for system messages.
    pub sender_id: Option<Uuid>,
    pub content: Option<MessageContent>,
    pub kind: MessageType,
    pub status: MessageStatus,
    pub attachments: Vec<Attachment>,
    pub location: Option<Coordinates>,
    pub reply_to_message_id: Option<Uuid>,
    pub reactions: ReactionSet,
    pub sent_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Bumped on every edit.
    pub version: i32,
}

impl Message {
    fn base(conversation_id: Uuid, sender_id: Option<Uuid>, kind: MessageType) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            content: None,
            kind,
            status: MessageStatus::Sent,
            attachments: Vec::new(),
            location: None,
            reply_to_message_id: None,
            reactions: ReactionSet::new(),
            sent_at: Utc::now(),
            delivered_at: None,
            read_at: None,
            edited_at: None,
            deleted_at: None,
            version: 1,
        }
    }

    pub fn create_text(conversation_id: Uuid, sender_id: Uuid, content: &str) -> AppResult<Self> {
        let content = MessageContent::new(content)?;
        let mut message = Self::base(conversation_id, Some(sender_id), MessageType::Text);
        message.content = Some(content);
        Ok(message)
    }

    pub fn create_media(
        conversation_id: Uuid,
        sender_id: Uuid,
        kind: MessageType,
        caption: Option<&str>,
        attachments: Vec<Attachment>,
    ) -> AppResult<Self> {
        if !kind.requires_attachment() {
            return Err(AppError::UnsupportedOperation(
                "not a media message type",
            ));
        }
        if attachments.is_empty() {
            return Err(AppError::InvalidContent(
                "media messages require at least one attachment".into(),
            ));
        }
        let mut message = Self::base(conversation_id, Some(sender_id), kind);
        message.content = caption.map(MessageContent::new).transpose()?;
        message.attachments = attachments;
        Ok(message)
    }

    pub fn create_location(
        conversation_id: Uuid,
        sender_id: Uuid,
        coordinates: Coordinates,
        caption: Option<&str>,
    ) -> AppResult<Self> {
        let mut message = Self::base(conversation_id, Some(sender_id), MessageType::Location);
        message.content = caption.map(MessageContent::new).transpose()?;
        message.location = Some(coordinates);
        Ok(message)
    }

    pub fn create_reply(
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
        reply_to_message_id: Uuid,
    ) -> AppResult<Self> {
        let mut message = Self::create_text(conversation_id, sender_id, content)?;
        message.reply_to_message_id = Some(reply_to_message_id);
        Ok(message)
    }

    pub fn create_system(conversation_id: Uuid, content: &str) -> AppResult<Self> {
        let content = MessageContent::new(content)?;
        let mut message = Self::base(conversation_id, None, MessageType::System);
        message.content = Some(content);
        Ok(message)
    }

    pub fn is_deleted(&self) -> bool {
        self.status == MessageStatus::Deleted || self.deleted_at.is_some()
    }

    /// Idempotent: a message that is already delivered (or further along)
    /// comes back unchanged.
    pub fn mark_delivered(&self, at: DateTime<Utc>) -> AppResult<Self> {
        if self.status == MessageStatus::Failed {
            return Err(AppError::InvalidStateTransition(
                "cannot deliver a failed message",
            ));
        }
        if self.delivered_at.is_some() || self.is_deleted() {
            return Ok(self.clone());
        }
        let mut next = self.clone();
        next.delivered_at = Some(at);
        if next.status == MessageStatus::Sent || next.status == MessageStatus::Pending {
            next.status = MessageStatus::Delivered;
        }
        Ok(next)
    }

    /// Requires a prior delivery; repeated calls are a no-op, not an error.
    pub fn mark_read(&self, at: DateTime<Utc>) -> AppResult<Self> {
        if self.status == MessageStatus::Failed {
            return Err(AppError::InvalidStateTransition(
                "cannot mark a failed message as read",
            ));
        }
        if self.read_at.is_some() {
            return Ok(self.clone());
        }
        if self.delivered_at.is_none() {
            return Err(AppError::InvalidStateTransition(
                "message has not been delivered yet",
            ));
        }
        let mut next = self.clone();
        next.read_at = Some(at);
        if next.status == MessageStatus::Delivered {
            next.status = MessageStatus::Read;
        }
        Ok(next)
    }

    pub fn edit(&self, new_content: &str, at: DateTime<Utc>) -> AppResult<Self> {
        if self.kind == MessageType::System {
            return Err(AppError::UnsupportedOperation(
                "system messages cannot be edited",
            ));
        }
        if self.is_deleted() {
            return Err(AppError::UnsupportedOperation(
                "deleted messages cannot be edited",
            ));
        }
        if at - self.sent_at > Duration::hours(EDIT_WINDOW_HOURS) {
            return Err(AppError::EditWindowExpired {
                max_edit_hours: EDIT_WINDOW_HOURS,
            });
        }
        let content = MessageContent::new(new_content)?;
        let mut next = self.clone();
        next.content = Some(content);
        next.edited_at = Some(at);
        next.version += 1;
        Ok(next)
    }

    /// Content-redaction transition: the row stays so reply references keep
    /// resolving. Deleting twice is a no-op.
    pub fn delete(&self, at: DateTime<Utc>) -> AppResult<Self> {
        if self.is_deleted() {
            return Ok(self.clone());
        }
        let mut next = self.clone();
        next.content = Some(MessageContent::tombstone());
        next.attachments.clear();
        next.location = None;
        next.status = MessageStatus::Deleted;
        next.deleted_at = Some(at);
        Ok(next)
    }

    pub fn add_reaction(&self, emoji: &str, user_id: Uuid) -> AppResult<Self> {
        if self.is_deleted() {
            return Err(AppError::UnsupportedOperation(
                "cannot react to a deleted message",
            ));
        }
        if emoji.trim().is_empty() {
            return Err(AppError::InvalidContent("emoji cannot be empty".into()));
        }
        let mut next = self.clone();
        next.reactions.add(emoji, user_id);
        Ok(next)
    }

    pub fn remove_reaction(&self, emoji: &str, user_id: Uuid) -> AppResult<Self> {
        let mut next = self.clone();
        next.reactions.remove(emoji, user_id);
        Ok(next)
    }
}
