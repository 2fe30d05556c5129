use shared::events::Event;
use storage::Session;
use tracing::debug;

use super::EventMiddleware;
use crate::unread;

/// Keeps restricted messages out of the channel list of viewers outside the
/// restriction, and restores them when the viewer is let back in.
///
/// Only messages this middleware pulled out are put back; a message the viewer
/// never had in their list stays out. Unread counters follow the list.
pub struct RestrictedVisibilityMiddleware;

impl EventMiddleware for RestrictedVisibilityMiddleware {
    fn handle(&self, event: Event, session: &mut Session<'_>) -> Option<Event> {
        let Event::MessageUpdated { message, .. } = &event else {
            return Some(event);
        };
        let Some(viewer) = session.current_user_id().cloned() else {
            return Some(event);
        };
        let Some(stored) = session.message(&message.id) else {
            return Some(event);
        };
        if stored.is_hard_deleted {
            return Some(event);
        }

        let visible = stored.is_visible_to(&viewer);
        let suppressed = stored.visibility_suppressed;
        let materialized = session.is_materialized(&message.id);

        if !visible && materialized {
            // counted as it was before this update restricted it
            if let Some(before) = session.committed_message(&message.id).cloned() {
                unread::release(session, &before);
            }
            session.dematerialize_message(&message.id);
            if let Some(stored) = session.message_mut(&message.id) {
                stored.visibility_suppressed = true;
            }
            debug!(message_id = %message.id, "visibility: hid restricted message");
        } else if visible && suppressed {
            if let Some(stored) = session.message_mut(&message.id) {
                stored.visibility_suppressed = false;
            }
            match session.materialize_message(&message.id) {
                Ok(true) => {
                    unread::claim(session, &message.id);
                }
                Ok(false) => {}
                Err(err) => {
                    debug!(message_id = %message.id, error = %err, "visibility: restore skipped");
                }
            }
        }

        Some(event)
    }
}

#[cfg(test)]
#[path = "tests/restricted_visibility_tests.rs"]
mod tests;
