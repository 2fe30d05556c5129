use shared::events::Event;
use storage::{Session, StoreError};
use tracing::warn;

use super::EventMiddleware;

/// Writes every entity payload an event carries before any rule runs.
///
/// The writes are all-or-nothing: if one payload cannot be stored the event is
/// dropped and the replica keeps its previous state until the next resync.
pub struct PayloadUpsertMiddleware;

impl EventMiddleware for PayloadUpsertMiddleware {
    fn handle(&self, event: Event, session: &mut Session<'_>) -> Option<Event> {
        match session.savepoint(|session| save_payloads(&event, session)) {
            Ok(()) => {
                // a dropped event must not move the resync watermark past itself
                if let Some(at) = event.created_at() {
                    session.record_event_time(at);
                }
                Some(event)
            }
            Err(err) => {
                warn!(
                    event = event.kind(),
                    cid = ?event.cid(),
                    error = %err,
                    "upsert: dropping event, payloads could not be stored"
                );
                None
            }
        }
    }
}

fn save_payloads(event: &Event, session: &mut Session<'_>) -> Result<(), StoreError> {
    let cid = event.cid();
    let payloads = event.payloads();

    if let Some(user) = payloads.user {
        session.save_user(user);
    }
    if let Some(channel) = payloads.channel {
        session.save_channel(channel)?;
    } else if let (Some(cid), false) = (cid, matches!(event, Event::Custom { .. })) {
        session.ensure_channel(cid);
    }
    if let Some(me) = payloads.current_user {
        session.save_current_user(me);
    }
    if let Some(unread) = payloads.unread {
        session.update_unread_totals(unread);
    }
    if let (Some(member), Some(cid)) = (payloads.member, cid) {
        session.save_member(cid, member);
    }
    if let Some(message) = payloads.message {
        session.save_message(message, cid)?;
        if let Event::MessageDeleted {
            hard_delete,
            created_at,
            ..
        } = event
        {
            if *hard_delete {
                session.mark_message_hard_deleted(&message.id);
            } else {
                session.mark_message_soft_deleted(&message.id, *created_at);
            }
        }
    }
    if let Some(thread) = payloads.thread {
        session.save_thread(thread)?;
    }
    if let Some(reaction) = payloads.reaction {
        if matches!(event, Event::ReactionDeleted { .. }) {
            session.delete_reaction(reaction);
        } else {
            session.save_reaction(reaction)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/payload_upsert_tests.rs"]
mod tests;
