use std::sync::Mutex;

use shared::{domain::UserId, protocol::UserPayload};
use storage::Store;

use super::*;
use crate::test_support::{at, general, message, message_new, store_with_channel};

struct Recorder {
    name: &'static str,
    seen: Arc<Mutex<Vec<&'static str>>>,
}

impl EventMiddleware for Recorder {
    fn handle(&self, event: Event, _session: &mut Session<'_>) -> Option<Event> {
        self.seen.lock().expect("seen").push(self.name);
        Some(event)
    }
}

struct Swallow;

impl EventMiddleware for Swallow {
    fn handle(&self, _event: Event, session: &mut Session<'_>) -> Option<Event> {
        session.save_user(&UserPayload::new("written-before-swallow"));
        None
    }
}

#[test]
fn standard_chain_has_every_middleware() {
    let chain = EventMiddlewareChain::standard(ChainDependencies::default());

    assert_eq!(chain.len(), 11);
    assert!(!chain.is_empty());
    assert!(EventMiddlewareChain::new(Vec::new()).is_empty());
}

#[test]
fn middlewares_run_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let chain = EventMiddlewareChain::new(vec![
        Box::new(Recorder {
            name: "first",
            seen: seen.clone(),
        }),
        Box::new(Recorder {
            name: "second",
            seen: seen.clone(),
        }),
    ]);
    let store = Store::for_user(UserId::new("me"));

    let forwarded = store
        .write(|session| Ok(chain.process(message_new(message("m-1", "alice", 1)), session)))
        .expect("write");

    assert!(forwarded.is_some());
    assert_eq!(*seen.lock().expect("seen"), vec!["first", "second"]);
}

#[test]
fn swallowing_stops_the_chain_but_keeps_earlier_writes() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let chain = EventMiddlewareChain::new(vec![
        Box::new(Swallow),
        Box::new(Recorder {
            name: "after",
            seen: seen.clone(),
        }),
    ]);
    let store = Store::for_user(UserId::new("me"));

    let forwarded = store
        .write(|session| Ok(chain.process(message_new(message("m-1", "alice", 1)), session)))
        .expect("write");

    assert_eq!(forwarded, None);
    assert!(seen.lock().expect("seen").is_empty());
    store.read(|replica| {
        assert!(replica
            .users
            .contains_key(&UserId::new("written-before-swallow")));
    });
}

#[test]
fn replaying_an_event_is_idempotent() {
    let chain = EventMiddlewareChain::standard(ChainDependencies::default());
    let store = store_with_channel();
    let event = message_new(message("m-1", "alice", 10));

    store
        .write(|session| Ok(chain.process(event.clone(), session)))
        .expect("first");
    let after_first = store.snapshot();
    store
        .write(|session| Ok(chain.process(event, session)))
        .expect("replay");

    assert_eq!(store.snapshot(), after_first);
    store.read(|replica| {
        assert_eq!(replica.channel_messages(&general()).len(), 1);
        assert_eq!(
            replica
                .current_user
                .as_ref()
                .and_then(|user| user.last_received_event_at),
            Some(at(10))
        );
    });
}
