//! Pure, stateless domain checks shared by the use cases. Nothing in here
//! touches a repository or the clock.

use crate::error::{AppError, AppResult};
use crate::models::conversation::{MAX_GROUP_PARTICIPANTS, MIN_GROUP_PARTICIPANTS};
use crate::models::{Conversation, ConversationKind, Message, MessageType, ParticipantRole};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Read,
    Write,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOp {
    Edit,
    Delete,
}

/// De-duplicates and validates a participant id list ahead of aggregate
/// construction. Returns the deduplicated ids in input order.
pub fn validate_participants(ids: &[Uuid], kind: ConversationKind) -> AppResult<Vec<Uuid>> {
    let mut deduped: Vec<Uuid> = Vec::with_capacity(ids.len());
    for id in ids {
        if !deduped.contains(id) {
            deduped.push(*id);
        }
    }
    match kind {
        ConversationKind::Private => {
            if deduped.len() != 2 {
                return Err(AppError::InvalidParticipantCount {
                    expected: "2 distinct participants",
                    actual: deduped.len(),
                });
            }
        }
        ConversationKind::Group => {
            if deduped.len() < MIN_GROUP_PARTICIPANTS || deduped.len() > MAX_GROUP_PARTICIPANTS {
                return Err(AppError::InvalidParticipantCount {
                    expected: "2-100 participants",
                    actual: deduped.len(),
                });
            }
        }
    }
    Ok(deduped)
}

/// Read and write require an *active* participant; participants that left
/// keep their history but lose access. Admin additionally requires the admin
/// role or being the creator. Deleted conversations stay readable for history
/// but reject every write.
pub fn validate_conversation_access(
    conversation: &Conversation,
    user_id: Uuid,
    level: AccessLevel,
) -> AppResult<()> {
    let participant = conversation
        .participant(user_id)
        .filter(|p| p.is_active())
        .ok_or(AppError::AccessDenied)?;

    if level == AccessLevel::Admin
        && participant.role != ParticipantRole::Admin
        && conversation.created_by != user_id
    {
        return Err(AppError::AccessDenied);
    }
    if level != AccessLevel::Read && conversation.is_deleted() {
        return Err(AppError::InvalidStateTransition(
            "conversation has been deleted",
        ));
    }
    Ok(())
}

/// Only the sender may edit or delete a message; system messages are off
/// limits entirely.
pub fn validate_message_operation(
    message: &Message,
    user_id: Uuid,
    _op: MessageOp,
) -> AppResult<()> {
    if message.kind == MessageType::System {
        return Err(AppError::UnsupportedOperation(
            "system messages cannot be modified",
        ));
    }
    if message.sender_id != Some(user_id) {
        return Err(AppError::AccessDenied);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_participant_count_is_bounded() {
        let ids: Vec<Uuid> = (0..101).map(|_| Uuid::new_v4()).collect();
        assert!(matches!(
            validate_participants(&ids, ConversationKind::Group),
            Err(AppError::InvalidParticipantCount { actual: 101, .. })
        ));
        assert!(validate_participants(&ids[..100], ConversationKind::Group).is_ok());
        assert!(matches!(
            validate_participants(&ids[..1], ConversationKind::Group),
            Err(AppError::InvalidParticipantCount { actual: 1, .. })
        ));
    }

    #[test]
    fn duplicates_collapse_before_the_count_check() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let deduped = validate_participants(&[a, b, a, b], ConversationKind::Private).unwrap();
        assert_eq!(deduped, vec![a, b]);
    }

    #[test]
    fn left_participants_lose_access() {
        let creator = Uuid::new_v4();
        let member = Uuid::new_v4();
        let conversation =
            Conversation::create_group("team", &[member, Uuid::new_v4()], creator).unwrap();
        let conversation = conversation.remove_participant(member, member).unwrap();

        assert!(matches!(
            validate_conversation_access(&conversation, member, AccessLevel::Read),
            Err(AppError::AccessDenied)
        ));
    }
}
