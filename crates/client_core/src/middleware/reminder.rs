use shared::events::Event;
use storage::Session;
use tracing::debug;

use super::EventMiddleware;

/// Message reminders, one per message.
pub struct ReminderMiddleware;

impl EventMiddleware for ReminderMiddleware {
    fn handle(&self, event: Event, session: &mut Session<'_>) -> Option<Event> {
        match &event {
            Event::ReminderCreated { reminder, .. } | Event::ReminderUpdated { reminder, .. } => {
                session.save_reminder(reminder);
            }
            Event::ReminderDue {
                message_id,
                reminder,
                ..
            } => match session.reminder_mut(message_id) {
                Some(stored) => {
                    stored.remind_at = reminder.remind_at;
                    stored.updated_at = reminder.updated_at.or(stored.updated_at);
                }
                None => debug!(message_id = %message_id, "reminders: due reminder is not tracked"),
            },
            Event::ReminderDeleted { message_id, .. } => {
                session.delete_reminder(message_id);
            }
            _ => {}
        }
        Some(event)
    }
}

#[cfg(test)]
#[path = "tests/reminder_tests.rs"]
mod tests;
