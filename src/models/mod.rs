use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

pub mod conversation;
pub mod message;

pub use conversation::{Conversation, ConversationKind, ConversationParticipant, ConversationStatus};
pub use message::{Attachment, Coordinates, Message, MessageStatus, MessageType};

pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Replacement content for deleted messages. The row stays in place so
/// reply references and pagination cursors keep resolving.
pub const TOMBSTONE: &str = "[deleted]";

/// Validated message body: trimmed, non-empty, at most [`MAX_CONTENT_CHARS`]
/// characters. Editing produces a new value; the inner string never mutates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageContent(String);

impl MessageContent {
    pub fn new(raw: impl Into<String>) -> Result<Self, crate::error::AppError> {
        let trimmed = raw.into().trim().to_string();
        if trimmed.is_empty() {
            return Err(crate::error::AppError::InvalidContent(
                "message content cannot be empty".into(),
            ));
        }
        let chars = trimmed.chars().count();
        if chars > MAX_CONTENT_CHARS {
            return Err(crate::error::AppError::InvalidContent(format!(
                "message content too long ({chars} chars, max {MAX_CONTENT_CHARS})"
            )));
        }
        Ok(Self(trimmed))
    }

    pub fn tombstone() -> Self {
        Self(TOMBSTONE.to_string())
    }

    pub fn is_tombstone(&self) -> bool {
        self.0 == TOMBSTONE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MessageContent {
    type Error = crate::error::AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MessageContent> for String {
    fn from(value: MessageContent) -> Self {
        value.0
    }
}

impl std::fmt::Display for MessageContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Admin,
    Moderator,
    Member,
    Guest,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::Member => "member",
            Self::Guest => "guest",
        }
    }
}

/// Per-message reaction state: emoji -> reacting user ids. Ordered maps keep
/// serialization deterministic. Adds and removes are idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionSet(BTreeMap<String, BTreeSet<Uuid>>);

impl ReactionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the reaction was newly added.
    pub fn add(&mut self, emoji: &str, user_id: Uuid) -> bool {
        self.0.entry(emoji.to_string()).or_default().insert(user_id)
    }

    /// Returns true if the reaction existed and was removed.
    pub fn remove(&mut self, emoji: &str, user_id: Uuid) -> bool {
        let Some(users) = self.0.get_mut(emoji) else {
            return false;
        };
        let removed = users.remove(&user_id);
        if users.is_empty() {
            self.0.remove(emoji);
        }
        removed
    }

    pub fn contains(&self, emoji: &str, user_id: Uuid) -> bool {
        self.0.get(emoji).is_some_and(|users| users.contains(&user_id))
    }

    pub fn count(&self, emoji: &str) -> usize {
        self.0.get(emoji).map_or(0, BTreeSet::len)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<Uuid>)> {
        self.0.iter().map(|(emoji, users)| (emoji.as_str(), users))
    }
}
