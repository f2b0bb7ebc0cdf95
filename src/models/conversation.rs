use crate::error::{AppError, AppResult};
use crate::models::ParticipantRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_GROUP_PARTICIPANTS: usize = 2;
pub const MAX_GROUP_PARTICIPANTS: usize = 100;
pub const MAX_TITLE_CHARS: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    Private,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Archived,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationParticipant {
    pub user_id: Uuid,
    pub role: ParticipantRole,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    /// Read watermark for unread counts; advanced by mark-conversation-read.
    pub last_read_at: Option<DateTime<Utc>>,
}

impl ConversationParticipant {
    fn new(user_id: Uuid, role: ParticipantRole, joined_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            role,
            joined_at,
            left_at: None,
            last_read_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.left_at.is_none()
    }
}

/// Immutable conversation aggregate. Every mutator is a pure function
/// `(state, args) -> AppResult<state>`; the persistence layer is the only
/// serialization point for concurrent writers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub kind: ConversationKind,
    /// Group conversations only; private conversations never carry a title.
    pub title: Option<String>,
    /// Insertion order is join order. Participants that left stay in the list
    /// with `left_at` set, for history.
    pub participants: Vec<ConversationParticipant>,
    pub created_by: Uuid,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Conversation {
    pub fn create_private(a: Uuid, b: Uuid, created_by: Uuid) -> AppResult<Self> {
        if a == b {
            return Err(AppError::InvalidParticipantCount {
                expected: "2 distinct participants",
                actual: 1,
            });
        }
        if created_by != a && created_by != b {
            return Err(AppError::AccessDenied);
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            kind: ConversationKind::Private,
            title: None,
            participants: vec![
                ConversationParticipant::new(a, ParticipantRole::Member, now),
                ConversationParticipant::new(b, ParticipantRole::Member, now),
            ],
            created_by,
            status: ConversationStatus::Active,
            created_at: now,
            updated_at: now,
            last_activity_at: now,
        })
    }

    /// Creates a group conversation. The creator is always included (as admin)
    /// even when omitted from `participant_ids`; duplicates are dropped.
    pub fn create_group(
        title: &str,
        participant_ids: &[Uuid],
        created_by: Uuid,
    ) -> AppResult<Self> {
        let title = validate_title(title)?;

        let mut member_ids = vec![created_by];
        for id in participant_ids {
            if !member_ids.contains(id) {
                member_ids.push(*id);
            }
        }
        if member_ids.len() < MIN_GROUP_PARTICIPANTS || member_ids.len() > MAX_GROUP_PARTICIPANTS {
            return Err(AppError::InvalidParticipantCount {
                expected: "2-100 participants",
                actual: member_ids.len(),
            });
        }

        let now = Utc::now();
        let participants = member_ids
            .into_iter()
            .map(|user_id| {
                let role = if user_id == created_by {
                    ParticipantRole::Admin
                } else {
                    ParticipantRole::Member
                };
                ConversationParticipant::new(user_id, role, now)
            })
            .collect();

        Ok(Self {
            id: Uuid::new_v4(),
            kind: ConversationKind::Group,
            title: Some(title),
            participants,
            created_by,
            status: ConversationStatus::Active,
            created_at: now,
            updated_at: now,
            last_activity_at: now,
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.status == ConversationStatus::Deleted
    }

    pub fn participant(&self, user_id: Uuid) -> Option<&ConversationParticipant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn is_active_participant(&self, user_id: Uuid) -> bool {
        self.participant(user_id).is_some_and(|p| p.is_active())
    }

    pub fn active_participant_ids(&self) -> Vec<Uuid> {
        self.participants
            .iter()
            .filter(|p| p.is_active())
            .map(|p| p.user_id)
            .collect()
    }

    fn active_count(&self) -> usize {
        self.participants.iter().filter(|p| p.is_active()).count()
    }

    fn actor_is_admin(&self, actor_id: Uuid) -> bool {
        self.participant(actor_id)
            .is_some_and(|p| p.is_active() && p.role == ParticipantRole::Admin)
    }

    /// Adds (or reactivates) a participant. Group conversations only; the
    /// acting user must hold the admin role.
    pub fn add_participant(&self, user_id: Uuid, actor_id: Uuid) -> AppResult<Self> {
        if self.kind == ConversationKind::Private {
            return Err(AppError::UnsupportedOperation(
                "cannot add participants to a private conversation",
            ));
        }
        if self.is_deleted() {
            return Err(AppError::InvalidStateTransition(
                "conversation has been deleted",
            ));
        }
        if !self.actor_is_admin(actor_id) {
            return Err(AppError::AccessDenied);
        }
        if self.is_active_participant(user_id) {
            return Err(AppError::DuplicateParticipant);
        }
        if self.active_count() >= MAX_GROUP_PARTICIPANTS {
            return Err(AppError::InvalidParticipantCount {
                expected: "2-100 participants",
                actual: self.active_count() + 1,
            });
        }

        let now = Utc::now();
        let mut next = self.clone();
        match next.participants.iter_mut().find(|p| p.user_id == user_id) {
            // Rejoin: reactivate the historical entry rather than append a
            // second row for the same user.
            Some(existing) => {
                existing.left_at = None;
                existing.joined_at = now;
                existing.role = ParticipantRole::Member;
            }
            None => next
                .participants
                .push(ConversationParticipant::new(user_id, ParticipantRole::Member, now)),
        }
        next.updated_at = now;
        next.last_activity_at = now;
        Ok(next)
    }

    /// Removes a participant. Self-removal is always allowed; removing someone
    /// else requires the admin role. The entry stays in the list with
    /// `left_at` set.
    pub fn remove_participant(&self, user_id: Uuid, actor_id: Uuid) -> AppResult<Self> {
        if self.kind == ConversationKind::Private {
            return Err(AppError::UnsupportedOperation(
                "cannot remove participants from a private conversation",
            ));
        }
        if self.is_deleted() {
            return Err(AppError::InvalidStateTransition(
                "conversation has been deleted",
            ));
        }
        if user_id != actor_id && !self.actor_is_admin(actor_id) {
            return Err(AppError::AccessDenied);
        }
        if !self.is_active_participant(user_id) {
            return Err(AppError::NotFound);
        }

        let now = Utc::now();
        let mut next = self.clone();
        if let Some(p) = next.participants.iter_mut().find(|p| p.user_id == user_id) {
            p.left_at = Some(now);
        }
        next.updated_at = now;
        next.last_activity_at = now;
        Ok(next)
    }

    pub fn update_title(&self, title: &str) -> AppResult<Self> {
        if self.kind == ConversationKind::Private {
            return Err(AppError::UnsupportedOperation(
                "private conversations have no title",
            ));
        }
        let title = validate_title(title)?;
        let mut next = self.clone();
        next.title = Some(title);
        next.updated_at = Utc::now();
        Ok(next)
    }

    pub fn archive(&self) -> AppResult<Self> {
        match self.status {
            ConversationStatus::Active | ConversationStatus::Archived => {
                let mut next = self.clone();
                next.status = ConversationStatus::Archived;
                next.updated_at = Utc::now();
                Ok(next)
            }
            ConversationStatus::Deleted => Err(AppError::InvalidStateTransition(
                "cannot archive a deleted conversation",
            )),
        }
    }

    pub fn unarchive(&self) -> AppResult<Self> {
        match self.status {
            ConversationStatus::Active | ConversationStatus::Archived => {
                let mut next = self.clone();
                next.status = ConversationStatus::Active;
                next.updated_at = Utc::now();
                Ok(next)
            }
            ConversationStatus::Deleted => Err(AppError::InvalidStateTransition(
                "cannot unarchive a deleted conversation",
            )),
        }
    }

    /// Terminal transition. Rows are never removed; message history stays
    /// intact behind the status.
    pub fn delete(&self) -> AppResult<Self> {
        let mut next = self.clone();
        next.status = ConversationStatus::Deleted;
        next.updated_at = Utc::now();
        Ok(next)
    }

    /// Advances the caller's read watermark. The watermark never moves
    /// backwards, so repeated calls converge.
    pub fn mark_read_by(&self, user_id: Uuid, read_at: DateTime<Utc>) -> AppResult<Self> {
        if !self.is_active_participant(user_id) {
            return Err(AppError::AccessDenied);
        }
        let mut next = self.clone();
        if let Some(p) = next.participants.iter_mut().find(|p| p.user_id == user_id) {
            p.last_read_at = Some(match p.last_read_at {
                Some(existing) if existing > read_at => existing,
                _ => read_at,
            });
        }
        Ok(next)
    }

    /// Bumps activity timestamps; called when a message lands.
    pub fn touch(&self, at: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.last_activity_at = at;
        next.updated_at = at;
        next
    }
}

fn validate_title(title: &str) -> AppResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidContent("title cannot be empty".into()));
    }
    if trimmed.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::InvalidContent(format!(
            "title too long (max {MAX_TITLE_CHARS})"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_conversation_has_two_members_and_no_title() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let conversation = Conversation::create_private(a, b, a).unwrap();

        assert_eq!(conversation.kind, ConversationKind::Private);
        assert_eq!(conversation.active_participant_ids().len(), 2);
        assert!(conversation.title.is_none());
    }

    #[test]
    fn group_creation_always_includes_creator() {
        let creator = Uuid::new_v4();
        let others = vec![Uuid::new_v4(), Uuid::new_v4()];
        let conversation = Conversation::create_group("team", &others, creator).unwrap();

        assert!(conversation.is_active_participant(creator));
        assert_eq!(
            conversation.participant(creator).unwrap().role,
            ParticipantRole::Admin
        );
        assert_eq!(conversation.active_participant_ids().len(), 3);
    }

    #[test]
    fn rejoin_reactivates_the_historical_entry() {
        let creator = Uuid::new_v4();
        let member = Uuid::new_v4();
        let conversation =
            Conversation::create_group("team", &[member, Uuid::new_v4()], creator).unwrap();

        let conversation = conversation.remove_participant(member, member).unwrap();
        assert!(!conversation.is_active_participant(member));

        let conversation = conversation.add_participant(member, creator).unwrap();
        assert!(conversation.is_active_participant(member));
        // Still one entry per user.
        assert_eq!(
            conversation
                .participants
                .iter()
                .filter(|p| p.user_id == member)
                .count(),
            1
        );
    }
}
