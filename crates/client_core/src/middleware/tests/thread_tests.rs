use shared::{
    domain::UserId,
    protocol::{ThreadPayload, UserPayload},
};
use storage::Store;

use super::*;
use crate::{
    middleware::PayloadUpsertMiddleware,
    test_support::{
        at, general, me, message, message_deleted, message_new, message_updated, mid, reply, run,
        store_with_channel,
    },
};

fn apply(store: &Store, event: Event) -> Option<Event> {
    run(store, &[&PayloadUpsertMiddleware, &ThreadMiddleware], event)
}

/// `general` with parent message `p` and an empty thread under it.
fn store_with_thread() -> Store {
    let store = store_with_channel();
    let thread = ThreadPayload {
        parent_message_id: mid("p"),
        cid: general(),
        parent_message: Some(message("p", "alice", 1)),
        title: None,
        participant_count: 1,
        reply_count: 0,
        latest_replies: Vec::new(),
        read: Vec::new(),
        created_at: Some(at(1)),
        updated_at: Some(at(1)),
    };
    apply(
        &store,
        Event::ThreadUpdated {
            cid: general(),
            thread,
            created_at: at(1),
        },
    );
    store
}

fn thread<T>(store: &Store, f: impl FnOnce(&storage::model::Thread) -> T) -> T {
    store.read(|replica| f(replica.threads.get(&mid("p")).expect("thread")))
}

fn my_thread_unread(store: &Store) -> u32 {
    thread(store, |thread| {
        thread
            .reads
            .get(&me())
            .map_or(0, |read| read.unread_messages_count)
    })
}

#[test]
fn new_reply_is_appended_and_counted_once() {
    let store = store_with_thread();
    let event = message_new(reply("r-1", "p", "bob", 10));

    apply(&store, event.clone());
    apply(&store, event);

    thread(&store, |thread| {
        assert_eq!(thread.latest_replies, vec![mid("r-1")]);
        assert_eq!(thread.reply_count, 1);
        assert_eq!(thread.updated_at, Some(at(10)));
    });
    assert_eq!(my_thread_unread(&store), 1);
}

#[test]
fn own_and_muted_replies_do_not_count() {
    let store = store_with_thread();
    store
        .write(|session| {
            if let Some(viewer) = session.current_user_mut() {
                viewer.muted_user_ids.insert(UserId::new("troll"));
            }
            Ok(())
        })
        .expect("mute");

    apply(&store, message_new(reply("r-1", "p", "me", 10)));
    apply(&store, message_new(reply("r-2", "p", "troll", 11)));

    assert_eq!(my_thread_unread(&store), 0);
    thread(&store, |thread| assert_eq!(thread.latest_replies.len(), 2));
}

#[test]
fn reply_to_untracked_thread_is_ignored() {
    let store = store_with_channel();

    apply(&store, message_new(reply("r-1", "unknown", "bob", 10)));

    assert!(store.read(|replica| replica.threads.is_empty()));
}

#[test]
fn thread_notification_with_payload_keeps_server_reply_count() {
    let store = store_with_thread();
    let reply_payload = reply("r-1", "p", "bob", 10);
    let thread_payload = ThreadPayload {
        parent_message_id: mid("p"),
        cid: general(),
        parent_message: None,
        title: None,
        participant_count: 2,
        reply_count: 1,
        latest_replies: vec![reply_payload.clone()],
        read: Vec::new(),
        created_at: None,
        updated_at: Some(at(10)),
    };

    apply(
        &store,
        Event::ThreadMessageNew {
            cid: general(),
            message: reply_payload,
            channel: None,
            thread: Some(thread_payload),
            unread: None,
            created_at: at(10),
        },
    );

    thread(&store, |thread| {
        assert_eq!(thread.reply_count, 1);
        assert_eq!(thread.latest_replies, vec![mid("r-1")]);
    });
    assert_eq!(my_thread_unread(&store), 1);
}

#[test]
fn thread_read_and_mark_unread() {
    let store = store_with_thread();
    apply(&store, message_new(reply("r-1", "p", "bob", 10)));

    apply(
        &store,
        Event::MessageRead {
            cid: general(),
            user: UserPayload::new("me"),
            parent_message_id: Some(mid("p")),
            last_read_message_id: Some(mid("r-1")),
            thread: None,
            unread: None,
            created_at: at(20),
        },
    );
    assert_eq!(my_thread_unread(&store), 0);
    thread(&store, |thread| {
        let read = thread.reads.get(&me()).expect("read");
        assert_eq!(read.last_read_at, Some(at(20)));
        assert_eq!(read.last_read_message_id, Some(mid("r-1")));
    });

    apply(
        &store,
        Event::NotificationMarkUnread {
            cid: general(),
            user: UserPayload::new("me"),
            parent_message_id: Some(mid("p")),
            first_unread_message_id: Some(mid("r-1")),
            last_read_at: Some(at(5)),
            last_read_message_id: None,
            unread_messages: 1,
            unread: None,
            created_at: at(30),
        },
    );
    assert_eq!(my_thread_unread(&store), 1);
}

#[test]
fn hard_deleting_the_parent_drops_the_thread() {
    let store = store_with_thread();

    apply(&store, message_deleted(message("p", "alice", 1), true, 40));

    assert!(store.read(|replica| replica.threads.is_empty()));
}

#[test]
fn soft_deleting_the_parent_touches_the_thread() {
    let store = store_with_thread();

    apply(&store, message_deleted(message("p", "alice", 1), false, 40));

    thread(&store, |thread| assert_eq!(thread.updated_at, Some(at(40))));
}

#[test]
fn hard_deleted_reply_leaves_latest_replies() {
    let store = store_with_thread();
    apply(&store, message_new(reply("r-1", "p", "bob", 10)));
    apply(&store, message_new(reply("r-2", "p", "bob", 11)));

    apply(&store, message_deleted(reply("r-1", "p", "bob", 10), true, 50));

    thread(&store, |thread| {
        assert_eq!(thread.latest_replies, vec![mid("r-2")]);
        assert_eq!(thread.updated_at, Some(at(50)));
    });
}

#[test]
fn edited_reply_touches_the_thread() {
    let store = store_with_thread();
    apply(&store, message_new(reply("r-1", "p", "bob", 10)));

    apply(&store, message_updated(reply("r-1", "p", "bob", 10), 55));
    thread(&store, |thread| assert_eq!(thread.updated_at, Some(at(10))));

    let mut edited = reply("r-1", "p", "bob", 10);
    edited.text = "edited".into();
    apply(&store, message_updated(edited, 60));
    thread(&store, |thread| assert_eq!(thread.updated_at, Some(at(60))));
}

#[test]
fn truncating_or_deleting_the_channel_drops_its_threads() {
    let truncated = store_with_thread();
    apply(
        &truncated,
        Event::ChannelTruncated {
            cid: general(),
            channel: None,
            user: None,
            message: None,
            created_at: at(70),
        },
    );
    assert!(truncated.read(|replica| replica.threads.is_empty()));

    let deleted = store_with_thread();
    apply(
        &deleted,
        Event::ChannelDeleted {
            cid: general(),
            channel: None,
            created_at: at(70),
        },
    );
    assert!(deleted.read(|replica| replica.threads.is_empty()));
}
