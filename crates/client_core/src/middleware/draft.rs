use shared::events::Event;
use storage::Session;

use super::EventMiddleware;

/// One draft per channel, or per thread when the draft has a parent.
pub struct DraftMiddleware;

impl EventMiddleware for DraftMiddleware {
    fn handle(&self, event: Event, session: &mut Session<'_>) -> Option<Event> {
        match &event {
            Event::DraftUpdated { draft, .. } => {
                session.save_draft(draft);
            }
            Event::DraftDeleted { draft, .. } => {
                session.delete_draft(&draft.cid, draft.parent_id.as_ref());
            }
            _ => {}
        }
        Some(event)
    }
}

#[cfg(test)]
#[path = "tests/draft_tests.rs"]
mod tests;
