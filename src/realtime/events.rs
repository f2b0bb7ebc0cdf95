//! Closed set of real-time events pushed to connected clients.
//!
//! Every event is a tagged variant with an `object.action` type string, so
//! both the publish and subscribe sides can match exhaustively instead of
//! poking at loose JSON.

use crate::models::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// New message persisted.
    #[serde(rename = "message.received")]
    MessageReceived {
        conversation_id: Uuid,
        message: Message,
    },

    /// Read-receipt flow.
    #[serde(rename = "message.read")]
    MessageRead {
        conversation_id: Uuid,
        message_ids: Vec<Uuid>,
        read_by_user_id: Uuid,
        read_at: DateTime<Utc>,
    },

    /// Message content edited.
    #[serde(rename = "message.edited")]
    MessageEdited {
        conversation_id: Uuid,
        message_id: Uuid,
        version: i32,
    },

    /// Message redacted to a tombstone.
    #[serde(rename = "message.deleted")]
    MessageDeleted {
        conversation_id: Uuid,
        message_id: Uuid,
    },

    /// Reaction added or removed.
    #[serde(rename = "reaction.updated")]
    ReactionUpdated {
        conversation_id: Uuid,
        message_id: Uuid,
        emoji: String,
        user_id: Uuid,
        added: bool,
    },

    /// Ephemeral, never persisted.
    #[serde(rename = "typing.start")]
    TypingStart {
        conversation_id: Uuid,
        user_id: Uuid,
    },

    #[serde(rename = "typing.stop")]
    TypingStop {
        conversation_id: Uuid,
        user_id: Uuid,
    },

    /// Title, participant or status change.
    #[serde(rename = "conversation.updated")]
    ConversationUpdated { conversation_id: Uuid },
}

impl ClientEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MessageReceived { .. } => "message.received",
            Self::MessageRead { .. } => "message.read",
            Self::MessageEdited { .. } => "message.edited",
            Self::MessageDeleted { .. } => "message.deleted",
            Self::ReactionUpdated { .. } => "reaction.updated",
            Self::TypingStart { .. } => "typing.start",
            Self::TypingStop { .. } => "typing.stop",
            Self::ConversationUpdated { .. } => "conversation.updated",
        }
    }

    pub fn conversation_id(&self) -> Uuid {
        match self {
            Self::MessageReceived {
                conversation_id, ..
            }
            | Self::MessageRead {
                conversation_id, ..
            }
            | Self::MessageEdited {
                conversation_id, ..
            }
            | Self::MessageDeleted {
                conversation_id, ..
            }
            | Self::ReactionUpdated {
                conversation_id, ..
            }
            | Self::TypingStart {
                conversation_id, ..
            }
            | Self::TypingStop {
                conversation_id, ..
            }
            | Self::ConversationUpdated { conversation_id } => *conversation_id,
        }
    }
}

/// Cross-process envelope: any process may publish, all processes subscribe,
/// and whichever process holds a live connection for the target delivers.
/// `origin` names the publishing instance so it can skip its own broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub target_user_id: Uuid,
    pub origin: String,
    pub event: ClientEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_matches_serialized_tag() {
        let event = ClientEvent::TypingStart {
            conversation_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], event.event_type());
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let envelope = EventEnvelope {
            target_user_id: Uuid::new_v4(),
            origin: "instance-a".into(),
            event: ClientEvent::ConversationUpdated {
                conversation_id: Uuid::new_v4(),
            },
        };

        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, envelope);
    }
}
