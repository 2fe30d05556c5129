use shared::protocol::DraftPayload;

use super::*;
use crate::test_support::{at, general, mid, run, store_with_channel};

fn draft(parent: Option<&str>, text: &str) -> DraftPayload {
    DraftPayload {
        cid: general(),
        parent_id: parent.map(mid),
        text: text.into(),
        created_at: at(1),
    }
}

fn updated(draft: DraftPayload) -> Event {
    Event::DraftUpdated {
        cid: general(),
        draft,
        created_at: at(2),
    }
}

#[test]
fn channel_and_thread_drafts_are_kept_apart() {
    let store = store_with_channel();

    run(&store, &[&DraftMiddleware], updated(draft(None, "channel")));
    run(&store, &[&DraftMiddleware], updated(draft(Some("p"), "thread")));
    run(&store, &[&DraftMiddleware], updated(draft(None, "channel v2")));

    store.read(|replica| {
        assert_eq!(replica.drafts.len(), 2);
        let texts: Vec<_> = replica.drafts.values().map(|d| d.text.as_str()).collect();
        assert!(texts.contains(&"channel v2"));
        assert!(texts.contains(&"thread"));
    });
}

#[test]
fn deleting_removes_only_the_matching_draft() {
    let store = store_with_channel();
    run(&store, &[&DraftMiddleware], updated(draft(None, "channel")));
    run(&store, &[&DraftMiddleware], updated(draft(Some("p"), "thread")));

    run(
        &store,
        &[&DraftMiddleware],
        Event::DraftDeleted {
            cid: general(),
            draft: draft(Some("p"), ""),
            created_at: at(3),
        },
    );

    store.read(|replica| {
        let remaining: Vec<_> = replica.drafts.values().collect();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].parent_id, None);
    });
}
