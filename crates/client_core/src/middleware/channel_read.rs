use chrono::{DateTime, Utc};
use shared::{
    domain::{ChannelId, MessageId, UserId},
    events::Event,
};
use storage::Session;
use tracing::debug;

use super::EventMiddleware;
use crate::unread;

/// Maintains channel read cursors and unread counters incrementally.
pub struct ChannelReadMiddleware;

impl EventMiddleware for ChannelReadMiddleware {
    fn handle(&self, event: Event, session: &mut Session<'_>) -> Option<Event> {
        match &event {
            Event::MessageNew { cid, message, .. }
            | Event::NotificationMessageNew { cid, message, .. } => {
                increment_for_new_message(session, cid, &message.id);
            }
            Event::MessageDeleted { message, .. } => {
                decrement_for_deleted_message(session, &message.id);
            }
            Event::MessageRead {
                cid,
                user,
                parent_message_id: None,
                last_read_message_id,
                created_at,
                ..
            }
            | Event::NotificationMarkRead {
                cid,
                user,
                last_read_message_id,
                created_at,
                ..
            } => {
                mark_read(session, cid, &user.id, *created_at, last_read_message_id.clone());
            }
            Event::NotificationMarkAllRead {
                user, created_at, ..
            } => {
                for cid in session.channel_reads_for_user(&user.id) {
                    mark_read(session, &cid, &user.id, *created_at, None);
                }
            }
            Event::NotificationMarkUnread {
                cid,
                user,
                parent_message_id: None,
                last_read_at,
                last_read_message_id,
                unread_messages,
                ..
            } => {
                let read = session.ensure_channel_read(cid, &user.id);
                read.last_read_at = *last_read_at;
                read.last_read_message_id = last_read_message_id.clone();
                read.unread_messages_count = *unread_messages;
            }
            _ => {}
        }
        Some(event)
    }
}

fn increment_for_new_message(session: &mut Session<'_>, cid: &ChannelId, message_id: &MessageId) {
    // redelivered events must not count twice
    if !session.is_newly_inserted(message_id) {
        return;
    }
    let Some(viewer) = session.current_user() else {
        return;
    };
    let Some(message) = session.message(message_id) else {
        return;
    };
    let Some(kind) = unread::unread_kind(message, viewer, session.channel_read(cid, &viewer.id))
    else {
        return;
    };

    let viewer_id = viewer.id.clone();
    let read = session.ensure_channel_read(cid, &viewer_id);
    unread::bump(read, kind);
    debug!(
        cid = %cid,
        message_id = %message_id,
        unread = read.unread_messages_count,
        "reads: counted new message"
    );
}

fn decrement_for_deleted_message(session: &mut Session<'_>, message_id: &MessageId) {
    // judged as it was before this event deleted it; already-deleted messages never count
    if let Some(before) = session.committed_message(message_id).cloned() {
        unread::release(session, &before);
    }
}

fn mark_read(
    session: &mut Session<'_>,
    cid: &ChannelId,
    user_id: &UserId,
    at: DateTime<Utc>,
    message_id: Option<MessageId>,
) {
    session.ensure_channel_read(cid, user_id).mark_read(at, message_id);
}

#[cfg(test)]
#[path = "tests/channel_read_tests.rs"]
mod tests;
