use std::sync::Arc;

use shared::events::Event;
use storage::Session;

use super::EventMiddleware;
use crate::typing::{TypingRegistry, TypingWatchdog};

/// Tracks who is typing. The current user's own typing events are swallowed.
pub struct TypingStateMiddleware {
    registry: TypingRegistry,
    watchdog: Option<Arc<TypingWatchdog>>,
}

impl TypingStateMiddleware {
    pub fn new(registry: TypingRegistry, watchdog: Option<Arc<TypingWatchdog>>) -> Self {
        Self { registry, watchdog }
    }
}

impl EventMiddleware for TypingStateMiddleware {
    fn handle(&self, event: Event, session: &mut Session<'_>) -> Option<Event> {
        match &event {
            Event::TypingStart { cid, user, .. } => {
                if session.is_current_user(&user.id) {
                    return None;
                }
                self.registry.insert(cid, &user.id);
                if let Some(watchdog) = &self.watchdog {
                    watchdog.schedule(cid, &user.id);
                }
            }
            Event::TypingStop { cid, user, .. } => {
                if session.is_current_user(&user.id) {
                    return None;
                }
                self.registry.remove(cid, &user.id);
                if let Some(watchdog) = &self.watchdog {
                    watchdog.cancel(cid, &user.id);
                }
            }
            Event::TypingCleanUp { cid, user_id, .. } => {
                self.registry.remove(cid, user_id);
            }
            _ => {}
        }
        Some(event)
    }
}

#[cfg(test)]
#[path = "tests/typing_tests.rs"]
mod tests;
