use shared::protocol::ReminderPayload;

use super::*;
use crate::test_support::{at, general, mid, run, store_with_channel};

fn reminder(remind_at: Option<i64>) -> ReminderPayload {
    ReminderPayload {
        message_id: mid("m-1"),
        cid: general(),
        remind_at: remind_at.map(at),
        created_at: at(1),
        updated_at: None,
    }
}

fn due(remind_at: Option<i64>) -> Event {
    Event::ReminderDue {
        cid: general(),
        message_id: mid("m-1"),
        reminder: ReminderPayload {
            updated_at: Some(at(100)),
            ..reminder(remind_at)
        },
        created_at: at(100),
    }
}

#[test]
fn created_then_updated_reminder() {
    let store = store_with_channel();

    run(
        &store,
        &[&ReminderMiddleware],
        Event::ReminderCreated {
            cid: general(),
            message_id: mid("m-1"),
            reminder: reminder(Some(50)),
            created_at: at(1),
        },
    );
    run(
        &store,
        &[&ReminderMiddleware],
        Event::ReminderUpdated {
            cid: general(),
            message_id: mid("m-1"),
            reminder: reminder(Some(60)),
            created_at: at(2),
        },
    );

    store.read(|replica| {
        assert_eq!(replica.reminders.len(), 1);
        assert_eq!(
            replica.reminders.get(&mid("m-1")).and_then(|r| r.remind_at),
            Some(at(60))
        );
    });
}

#[test]
fn due_notification_never_creates_a_reminder() {
    let store = store_with_channel();

    let forwarded = run(&store, &[&ReminderMiddleware], due(Some(50)));

    assert!(forwarded.is_some());
    assert!(store.read(|replica| replica.reminders.is_empty()));
}

#[test]
fn due_notification_refreshes_a_tracked_reminder() {
    let store = store_with_channel();
    run(
        &store,
        &[&ReminderMiddleware],
        Event::ReminderCreated {
            cid: general(),
            message_id: mid("m-1"),
            reminder: reminder(Some(50)),
            created_at: at(1),
        },
    );

    run(&store, &[&ReminderMiddleware], due(Some(50)));

    store.read(|replica| {
        let stored = replica.reminders.get(&mid("m-1")).expect("reminder");
        assert_eq!(stored.updated_at, Some(at(100)));
    });
}

#[test]
fn deleted_reminder_is_removed() {
    let store = store_with_channel();
    run(
        &store,
        &[&ReminderMiddleware],
        Event::ReminderCreated {
            cid: general(),
            message_id: mid("m-1"),
            reminder: reminder(None),
            created_at: at(1),
        },
    );

    run(
        &store,
        &[&ReminderMiddleware],
        Event::ReminderDeleted {
            cid: general(),
            message_id: mid("m-1"),
            created_at: at(2),
        },
    );

    assert!(store.read(|replica| replica.reminders.is_empty()));
}
