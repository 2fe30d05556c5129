use shared::protocol::ChannelPayload;
use storage::Store;

use super::*;
use crate::{
    middleware::{ChannelReadMiddleware, PayloadUpsertMiddleware},
    test_support::{at, general, me, message, message_new, run, store_with_channel, unread_count},
};

fn apply(store: &Store, event: Event) -> Option<Event> {
    run(
        store,
        &[
            &PayloadUpsertMiddleware,
            &ChannelReadMiddleware,
            &ChannelVisibilityMiddleware,
        ],
        event,
    )
}

fn hidden(clear_history: bool, secs: i64) -> Event {
    Event::ChannelHidden {
        cid: general(),
        user: None,
        clear_history,
        created_at: at(secs),
    }
}

fn is_hidden(store: &Store) -> bool {
    store.read(|replica| replica.channel(&general()).is_some_and(|channel| channel.is_hidden))
}

#[test]
fn hidden_and_visible_toggle_the_flag() {
    let store = store_with_channel();

    apply(&store, hidden(false, 1));
    assert!(is_hidden(&store));

    apply(
        &store,
        Event::ChannelVisible {
            cid: general(),
            user: None,
            created_at: at(2),
        },
    );
    assert!(!is_hidden(&store));
}

#[test]
fn hiding_with_clear_history_truncates() {
    let store = store_with_channel();
    apply(&store, message_new(message("m-1", "alice", 10)));

    apply(&store, hidden(true, 20));

    store.read(|replica| {
        assert_eq!(
            replica.channel(&general()).and_then(|channel| channel.truncated_at),
            Some(at(20))
        );
        assert!(replica.channel_messages(&general()).is_empty());
    });
}

#[test]
fn new_message_unhides_unless_shadowed() {
    let store = store_with_channel();
    apply(&store, hidden(false, 1));

    let mut shadowed = message("m-1", "alice", 10);
    shadowed.shadowed = true;
    apply(&store, message_new(shadowed));
    assert!(is_hidden(&store));

    apply(&store, message_new(message("m-2", "alice", 11)));
    assert!(!is_hidden(&store));
}

#[test]
fn truncation_drops_older_messages_and_clears_counts() {
    let store = store_with_channel();
    apply(&store, message_new(message("m-1", "alice", 10)));
    apply(&store, message_new(message("m-2", "alice", 30)));
    assert_eq!(unread_count(&store, "me"), 2);

    let mut channel = ChannelPayload::new(general());
    channel.truncated_at = Some(at(20));
    apply(
        &store,
        Event::ChannelTruncated {
            cid: general(),
            channel: Some(channel),
            user: None,
            message: None,
            created_at: at(25),
        },
    );

    store.read(|replica| {
        let listed: Vec<_> = replica
            .channel_messages(&general())
            .into_iter()
            .map(|message| message.id.as_str().to_string())
            .collect();
        assert_eq!(listed, vec!["m-2".to_string()]);
        assert_eq!(
            replica.channel(&general()).and_then(|channel| channel.truncated_at),
            Some(at(20))
        );
        let read = replica.channel_read(&general(), &me()).expect("read");
        assert_eq!(read.unread_messages_count, 0);
    });
}

#[test]
fn messages_before_truncation_are_not_listed_again() {
    let store = store_with_channel();
    apply(
        &store,
        Event::ChannelTruncated {
            cid: general(),
            channel: None,
            user: None,
            message: None,
            created_at: at(20),
        },
    );

    apply(&store, message_new(message("late-copy", "alice", 10)));

    assert!(store.read(|replica| replica.channel_messages(&general()).is_empty()));
}

#[test]
fn deletion_stamps_deleted_at() {
    let store = store_with_channel();

    apply(
        &store,
        Event::ChannelDeleted {
            cid: general(),
            channel: None,
            created_at: at(40),
        },
    );

    store.read(|replica| {
        assert_eq!(
            replica.channel(&general()).and_then(|channel| channel.deleted_at),
            Some(at(40))
        );
    });
}
