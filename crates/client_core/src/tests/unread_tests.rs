use std::collections::{BTreeMap, BTreeSet};

use shared::domain::{ChannelId, MessageId, UserId};

use super::*;
use crate::test_support::{at, general, me};

fn stored(author: &str, secs: i64) -> Message {
    Message {
        id: MessageId::new(format!("{author}-{secs}")),
        cid: general(),
        user_id: UserId::new(author),
        text: "hi".into(),
        kind: MessageType::Regular,
        created_at: at(secs),
        updated_at: None,
        deleted_at: None,
        parent_id: None,
        show_reply_in_channel: false,
        is_silent: false,
        is_shadowed: false,
        restricted_visibility: BTreeSet::new(),
        is_hard_deleted: false,
        visibility_suppressed: false,
        reply_count: 0,
        reaction_counts: BTreeMap::new(),
    }
}

fn viewer() -> CurrentUser {
    CurrentUser::new(me())
}

fn read_at(secs: i64) -> ChannelRead {
    let mut read = ChannelRead::new(general(), me());
    read.last_read_at = Some(at(secs));
    read
}

#[test]
fn regular_message_from_someone_else_is_unread() {
    let message = stored("alice", 10);

    assert_eq!(
        unread_kind(&message, &viewer(), Some(&read_at(5))),
        Some(UnreadKind::Message)
    );
    assert!(counts_as_unread(&message, &viewer(), None));
}

#[test]
fn own_and_muted_messages_never_count() {
    let own = stored("me", 10);
    assert_eq!(unread_kind(&own, &viewer(), None), None);

    let mut muting_author = viewer();
    muting_author.muted_user_ids.insert(UserId::new("alice"));
    assert_eq!(unread_kind(&stored("alice", 10), &muting_author, None), None);

    let mut muting_channel = viewer();
    muting_channel.muted_channel_ids.insert(general());
    assert_eq!(unread_kind(&stored("alice", 10), &muting_channel, None), None);

    let mut elsewhere = viewer();
    elsewhere
        .muted_channel_ids
        .insert(ChannelId::new("messaging", "random"));
    assert!(counts_as_unread(&stored("alice", 10), &elsewhere, None));
}

#[test]
fn system_like_types_never_count() {
    for kind in [
        MessageType::System,
        MessageType::Ephemeral,
        MessageType::Error,
        MessageType::Deleted,
    ] {
        let mut message = stored("alice", 10);
        message.kind = kind;
        assert_eq!(unread_kind(&message, &viewer(), None), None, "{kind:?}");
    }

    let mut reply = stored("alice", 10);
    reply.kind = MessageType::Reply;
    assert!(counts_as_unread(&reply, &viewer(), None));
}

#[test]
fn messages_covered_by_the_cursor_are_read() {
    let message = stored("alice", 10);

    assert_eq!(unread_kind(&message, &viewer(), Some(&read_at(10))), None);
    assert_eq!(unread_kind(&message, &viewer(), Some(&read_at(20))), None);
    assert!(counts_as_unread(&message, &viewer(), Some(&read_at(9))));
}

#[test]
fn silent_messages_and_hidden_replies_use_side_counters() {
    let mut silent = stored("alice", 10);
    silent.is_silent = true;
    assert_eq!(
        unread_kind(&silent, &viewer(), None),
        Some(UnreadKind::SilentMessage)
    );
    assert!(!counts_as_unread(&silent, &viewer(), None));

    let mut reply = stored("alice", 10);
    reply.parent_id = Some(MessageId::new("parent"));
    assert_eq!(
        unread_kind(&reply, &viewer(), None),
        Some(UnreadKind::ThreadReply)
    );

    reply.show_reply_in_channel = true;
    assert_eq!(unread_kind(&reply, &viewer(), None), Some(UnreadKind::Message));
}

#[test]
fn shadowed_deleted_and_restricted_messages_never_count() {
    let mut shadowed = stored("alice", 10);
    shadowed.is_shadowed = true;
    assert_eq!(unread_kind(&shadowed, &viewer(), None), None);

    let mut deleted = stored("alice", 10);
    deleted.deleted_at = Some(at(11));
    assert_eq!(unread_kind(&deleted, &viewer(), None), None);

    let mut restricted = stored("alice", 10);
    restricted.restricted_visibility.insert(UserId::new("bob"));
    assert_eq!(unread_kind(&restricted, &viewer(), None), None);

    restricted.restricted_visibility.insert(me());
    assert!(counts_as_unread(&restricted, &viewer(), None));
}

#[test]
fn thread_unread_ignores_channel_list_rules() {
    let mut reply = stored("alice", 10);
    reply.parent_id = Some(MessageId::new("parent"));

    assert!(counts_as_thread_unread(&reply, &viewer()));
    assert!(!counts_as_thread_unread(&stored("me", 10), &viewer()));

    let mut muting = viewer();
    muting.muted_user_ids.insert(UserId::new("alice"));
    assert!(!counts_as_thread_unread(&reply, &muting));
}

#[test]
fn counters_never_go_below_zero() {
    let mut read = ChannelRead::new(general(), me());

    bump(&mut read, UnreadKind::Message);
    bump(&mut read, UnreadKind::SilentMessage);
    drop_one(&mut read, UnreadKind::Message);
    drop_one(&mut read, UnreadKind::Message);
    drop_one(&mut read, UnreadKind::ThreadReply);

    assert_eq!(read.unread_messages_count, 0);
    assert_eq!(read.unread_silent_messages_count, 1);
    assert_eq!(read.unread_thread_replies_count, 0);
}
