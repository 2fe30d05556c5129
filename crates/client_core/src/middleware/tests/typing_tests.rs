use shared::{domain::UserId, protocol::UserPayload};

use super::*;
use crate::test_support::{at, general, run, store_with_channel};

fn start(user: &str) -> Event {
    Event::TypingStart {
        cid: general(),
        user: UserPayload::new(user),
        parent_id: None,
        created_at: at(1),
    }
}

fn stop(user: &str) -> Event {
    Event::TypingStop {
        cid: general(),
        user: UserPayload::new(user),
        parent_id: None,
        created_at: at(2),
    }
}

#[test]
fn start_and_stop_track_remote_users() {
    let store = store_with_channel();
    let registry = TypingRegistry::new();
    let middleware = TypingStateMiddleware::new(registry.clone(), None);

    assert!(run(&store, &[&middleware], start("alice")).is_some());
    assert!(registry.is_typing(&general(), &UserId::new("alice")));

    assert!(run(&store, &[&middleware], stop("alice")).is_some());
    assert!(registry.typing_users(&general()).is_empty());
}

#[test]
fn own_typing_events_are_swallowed() {
    let store = store_with_channel();
    let registry = TypingRegistry::new();
    let middleware = TypingStateMiddleware::new(registry.clone(), None);

    assert_eq!(run(&store, &[&middleware], start("me")), None);
    assert_eq!(run(&store, &[&middleware], stop("me")), None);
    assert!(registry.typing_users(&general()).is_empty());
}

#[test]
fn clean_up_removes_the_user() {
    let store = store_with_channel();
    let registry = TypingRegistry::new();
    let middleware = TypingStateMiddleware::new(registry.clone(), None);
    run(&store, &[&middleware], start("alice"));

    let forwarded = run(
        &store,
        &[&middleware],
        Event::TypingCleanUp {
            cid: general(),
            user_id: UserId::new("alice"),
            created_at: at(20),
        },
    );

    assert!(forwarded.is_some());
    assert!(!registry.is_typing(&general(), &UserId::new("alice")));
}

#[tokio::test(start_paused = true)]
async fn start_schedules_and_stop_cancels_the_watchdog() {
    let store = store_with_channel();
    let (watchdog, _timeouts) = TypingWatchdog::new(std::time::Duration::from_secs(15));
    let watchdog = Arc::new(watchdog);
    let middleware = TypingStateMiddleware::new(TypingRegistry::new(), Some(watchdog.clone()));

    run(&store, &[&middleware], start("alice"));
    assert_eq!(watchdog.pending_count(), 1);

    run(&store, &[&middleware], stop("alice"));
    assert_eq!(watchdog.pending_count(), 0);
}
