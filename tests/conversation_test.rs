mod common;

use messaging_core::error::AppError;
use messaging_core::models::{ConversationKind, ConversationStatus};
use uuid::Uuid;

#[tokio::test]
async fn private_conversation_has_two_active_participants_and_no_title() {
    let (state, _) = common::test_state();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    let conversation = state.conversations.create_private(a, b).await.unwrap();

    assert_eq!(conversation.kind, ConversationKind::Private);
    assert_eq!(conversation.active_participant_ids(), vec![a, b]);
    assert!(conversation.title.is_none());
}

#[tokio::test]
async fn private_conversation_requires_two_distinct_ids() {
    let (state, _) = common::test_state();
    let a = Uuid::new_v4();

    let err = state.conversations.create_private(a, a).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidParticipantCount { .. }));
}

#[tokio::test]
async fn group_creator_is_included_even_when_omitted() {
    let (state, _) = common::test_state();
    let creator = Uuid::new_v4();
    let others = vec![Uuid::new_v4(), Uuid::new_v4()];

    let conversation = state
        .conversations
        .create_group(creator, "weekend plans", &others)
        .await
        .unwrap();

    assert!(conversation.is_active_participant(creator));
    assert_eq!(conversation.active_participant_ids().len(), 3);
    assert_eq!(conversation.title.as_deref(), Some("weekend plans"));
}

#[tokio::test]
async fn group_participant_count_is_enforced() {
    let (state, _) = common::test_state();
    let creator = Uuid::new_v4();

    let too_many: Vec<Uuid> = (0..100).map(|_| Uuid::new_v4()).collect();
    let err = state
        .conversations
        .create_group(creator, "crowd", &too_many)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidParticipantCount { actual: 101, .. }
    ));

    let err = state
        .conversations
        .create_group(creator, "just me", &[creator])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidParticipantCount { actual: 1, .. }
    ));
}

#[tokio::test]
async fn private_conversations_reject_structural_changes() {
    let (state, _) = common::test_state();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation = state.conversations.create_private(a, b).await.unwrap();

    let err = state
        .conversations
        .add_participant(a, conversation.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UnsupportedOperation(_)));

    let err = state
        .conversations
        .remove_participant(a, conversation.id, b)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UnsupportedOperation(_)));

    let err = state
        .conversations
        .rename(a, conversation.id, "nope")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UnsupportedOperation(_)));
}

#[tokio::test]
async fn only_admins_manage_other_participants() {
    let (state, _) = common::test_state();
    let creator = Uuid::new_v4();
    let member = Uuid::new_v4();
    let outsider = Uuid::new_v4();
    let conversation = state
        .conversations
        .create_group(creator, "team", &[member, Uuid::new_v4()])
        .await
        .unwrap();

    // Non-admin adding someone else.
    let err = state
        .conversations
        .add_participant(member, conversation.id, outsider)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccessDenied));

    // Non-admin removing someone else.
    let err = state
        .conversations
        .remove_participant(member, conversation.id, creator)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccessDenied));

    // Self-removal is always allowed.
    let conversation_after = state
        .conversations
        .remove_participant(member, conversation.id, member)
        .await
        .unwrap();
    assert!(!conversation_after.is_active_participant(member));

    // Admin adds a new participant.
    let conversation_after = state
        .conversations
        .add_participant(creator, conversation.id, outsider)
        .await
        .unwrap();
    assert!(conversation_after.is_active_participant(outsider));
}

#[tokio::test]
async fn adding_an_active_participant_twice_is_rejected() {
    let (state, _) = common::test_state();
    let creator = Uuid::new_v4();
    let member = Uuid::new_v4();
    let conversation = state
        .conversations
        .create_group(creator, "team", &[member])
        .await
        .unwrap();

    let err = state
        .conversations
        .add_participant(creator, conversation.id, member)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateParticipant));
}

#[tokio::test]
async fn non_participants_are_denied_access() {
    let (state, _) = common::test_state();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let stranger = Uuid::new_v4();
    let conversation = state.conversations.create_private(a, b).await.unwrap();

    let err = state
        .conversations
        .get(stranger, conversation.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccessDenied));

    let err = state
        .messages
        .send_text(stranger, conversation.id, "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccessDenied));

    let err = state
        .messages
        .get_messages(stranger, conversation.id, None, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccessDenied));
}

#[tokio::test]
async fn archive_is_reversible_until_deleted() {
    let (state, _) = common::test_state();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation = state.conversations.create_private(a, b).await.unwrap();

    let archived = state.conversations.archive(a, conversation.id).await.unwrap();
    assert_eq!(archived.status, ConversationStatus::Archived);

    let restored = state
        .conversations
        .unarchive(b, conversation.id)
        .await
        .unwrap();
    assert_eq!(restored.status, ConversationStatus::Active);

    let deleted = state.conversations.delete(a, conversation.id).await.unwrap();
    assert_eq!(deleted.status, ConversationStatus::Deleted);

    let err = state
        .conversations
        .archive(a, conversation.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn deleted_conversations_reject_writes_and_drop_from_listings() {
    let (state, _) = common::test_state();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation = state.conversations.create_private(a, b).await.unwrap();
    let message = state
        .messages
        .send_text(a, conversation.id, "before")
        .await
        .unwrap();

    state.conversations.delete(a, conversation.id).await.unwrap();

    let err = state
        .messages
        .send_text(a, conversation.id, "after")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));

    let err = state.messages.edit(a, message.id, "too late").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));

    let err = state
        .messages
        .add_reaction(b, message.id, "👍")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));

    // History stays readable, but the listing no longer carries the row.
    let page = state
        .messages
        .get_messages(b, conversation.id, None, 10)
        .await
        .unwrap();
    assert_eq!(page.messages.len(), 1);
    assert!(state.conversations.list(a).await.unwrap().is_empty());

    // Deleted groups reject participant changes too.
    let group = state
        .conversations
        .create_group(a, "team", &[b])
        .await
        .unwrap();
    state.conversations.delete(a, group.id).await.unwrap();
    let err = state
        .conversations
        .add_participant(a, group.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn listing_returns_most_recently_active_first() {
    let (state, _) = common::test_state();
    let a = Uuid::new_v4();

    let first = state
        .conversations
        .create_private(a, Uuid::new_v4())
        .await
        .unwrap();
    let second = state
        .conversations
        .create_private(a, Uuid::new_v4())
        .await
        .unwrap();

    // A message in the older conversation bumps it to the top.
    state
        .messages
        .send_text(a, first.id, "bump")
        .await
        .unwrap();

    let listed = state.conversations.list(a).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, first.id);
    assert_eq!(listed[1].id, second.id);
}

#[tokio::test]
async fn unread_count_follows_the_read_watermark() {
    let (state, _) = common::test_state();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let conversation = state.conversations.create_private(a, b).await.unwrap();

    for text in ["one", "two", "three"] {
        state.messages.send_text(b, conversation.id, text).await.unwrap();
    }
    assert_eq!(
        state.messages.unread_count(a, conversation.id).await.unwrap(),
        3
    );
    // Own messages never count as unread.
    assert_eq!(
        state.messages.unread_count(b, conversation.id).await.unwrap(),
        0
    );

    state.conversations.mark_read(a, conversation.id).await.unwrap();
    assert_eq!(
        state.messages.unread_count(a, conversation.id).await.unwrap(),
        0
    );

    state.messages.send_text(b, conversation.id, "four").await.unwrap();
    assert_eq!(
        state.messages.unread_count(a, conversation.id).await.unwrap(),
        1
    );
}
