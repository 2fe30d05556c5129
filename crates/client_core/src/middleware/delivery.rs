use std::sync::Arc;

use shared::events::Event;
use storage::Session;

use super::EventMiddleware;
use crate::delivery::{should_mark_delivered, DeliveryTracker};

/// Feeds the delivery tracker and records delivery receipts from the server.
pub struct DeliveryMiddleware {
    tracker: Arc<dyn DeliveryTracker>,
}

impl DeliveryMiddleware {
    pub fn new(tracker: Arc<dyn DeliveryTracker>) -> Self {
        Self { tracker }
    }
}

impl EventMiddleware for DeliveryMiddleware {
    fn handle(&self, event: Event, session: &mut Session<'_>) -> Option<Event> {
        match &event {
            Event::MessageNew { cid, message, .. }
            | Event::NotificationMessageNew { cid, message, .. } => {
                if should_mark_delivered(session, cid, &message.id) {
                    self.tracker.submit_for_delivery(cid, &message.id);
                }
            }
            Event::MessageRead {
                cid,
                user,
                parent_message_id: None,
                ..
            }
            | Event::NotificationMarkRead { cid, user, .. } => {
                // read implies delivered
                if session.is_current_user(&user.id) {
                    self.tracker.cancel(cid);
                }
            }
            Event::NotificationMarkAllRead { user, .. } => {
                if session.is_current_user(&user.id) {
                    for cid in session.channel_reads_for_user(&user.id) {
                        self.tracker.cancel(&cid);
                    }
                }
            }
            Event::MessageDelivered {
                cid,
                user,
                last_delivered_message_id,
                last_delivered_at,
                ..
            } => {
                let read = session.ensure_channel_read(cid, &user.id);
                if read
                    .last_delivered_at
                    .map_or(true, |delivered_at| *last_delivered_at >= delivered_at)
                {
                    read.last_delivered_at = Some(*last_delivered_at);
                    read.last_delivered_message_id = Some(last_delivered_message_id.clone());
                }
                if session.is_current_user(&user.id) {
                    self.tracker.cancel(cid);
                }
            }
            _ => {}
        }
        Some(event)
    }
}

#[cfg(test)]
#[path = "tests/delivery_tests.rs"]
mod tests;
