use shared::{
    domain::UserId,
    protocol::{ChannelPayload, UserPayload},
};
use storage::Store;

use super::*;
use crate::{
    middleware::PayloadUpsertMiddleware,
    test_support::{at, general, me, run, store_with_channel},
};

fn apply(store: &Store, event: Event) -> Option<Event> {
    run(store, &[&PayloadUpsertMiddleware, &MemberMiddleware], event)
}

fn added(user: &str, secs: i64) -> Event {
    Event::MemberAdded {
        cid: general(),
        user: UserPayload::new(user),
        member: MemberPayload::new(user),
        created_at: at(secs),
    }
}

fn removed(user: &str, secs: i64) -> Event {
    Event::MemberRemoved {
        cid: general(),
        user: UserPayload::new(user),
        member: None,
        created_at: at(secs),
    }
}

fn membership(store: &Store) -> Option<UserId> {
    store.read(|replica| {
        replica
            .channel(&general())
            .and_then(|channel| channel.membership.clone())
    })
}

#[test]
fn added_member_starts_fully_read() {
    let store = store_with_channel();

    apply(&store, added("alice", 10));

    store.read(|replica| {
        assert!(replica.member(&general(), &UserId::new("alice")).is_some());
        let read = replica
            .channel_read(&general(), &UserId::new("alice"))
            .expect("read");
        assert_eq!(read.last_read_at, Some(at(10)));
        assert_eq!(read.unread_messages_count, 0);
    });
    assert_eq!(membership(&store), None);
}

#[test]
fn adding_the_current_user_sets_membership() {
    let store = store_with_channel();

    apply(&store, added("me", 10));

    assert_eq!(membership(&store), Some(me()));
}

#[test]
fn removing_the_current_user_clears_membership_and_leaves_channel_unread() {
    let store = store_with_channel();
    apply(&store, added("me", 10));

    apply(&store, removed("me", 20));

    assert_eq!(membership(&store), None);
    store.read(|replica| {
        assert!(replica.member(&general(), &me()).is_none());
        let read = replica.channel_read(&general(), &me()).expect("read");
        assert_eq!(read.last_read_at, None);
        assert_eq!(read.last_read_message_id, None);
        assert!(read.is_unread());
    });
}

#[test]
fn removing_another_member_keeps_their_read() {
    let store = store_with_channel();
    apply(&store, added("alice", 10));

    apply(&store, removed("alice", 20));

    store.read(|replica| {
        assert!(replica.member(&general(), &UserId::new("alice")).is_none());
        assert_eq!(
            replica
                .channel_read(&general(), &UserId::new("alice"))
                .and_then(|read| read.last_read_at),
            Some(at(10))
        );
    });
}

#[test]
fn removal_unlinks_member_from_observed_lists() {
    let store = store_with_channel();
    apply(&store, added("alice", 10));
    store
        .write(|session| {
            session.save_member_list_query("general-members", &general())?;
            session.link_member_to_query("general-members", &UserId::new("alice"));
            Ok(())
        })
        .expect("query");

    apply(&store, removed("alice", 20));

    store.read(|replica| {
        let query = replica.member_queries.get("general-members").expect("query");
        assert!(query.members.is_empty());
    });
}

#[test]
fn rejected_invite_drops_membership() {
    let store = store_with_channel();
    let mut invited = MemberPayload::new("me");
    invited.invited = true;
    apply(
        &store,
        Event::NotificationInvited {
            cid: general(),
            channel: Some(ChannelPayload::new(general())),
            user: UserPayload::new("me"),
            member: invited.clone(),
            created_at: at(10),
        },
    );
    assert_eq!(membership(&store), Some(me()));

    invited.invite_rejected_at = Some(at(20));
    apply(
        &store,
        Event::NotificationInviteRejected {
            cid: general(),
            channel: None,
            user: UserPayload::new("me"),
            member: invited,
            created_at: at(20),
        },
    );

    assert_eq!(membership(&store), None);
}
