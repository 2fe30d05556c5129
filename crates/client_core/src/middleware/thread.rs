use chrono::{DateTime, Utc};
use shared::{
    domain::{ChannelId, MessageId},
    events::Event,
    protocol::MessagePayload,
};
use storage::Session;
use tracing::debug;

use super::EventMiddleware;
use crate::unread;

/// Thread replies, thread read cursors and thread lifecycle.
pub struct ThreadMiddleware;

impl EventMiddleware for ThreadMiddleware {
    fn handle(&self, event: Event, session: &mut Session<'_>) -> Option<Event> {
        match &event {
            Event::MessageNew { message, .. } => {
                append_reply(session, message, true);
            }
            Event::ThreadMessageNew {
                message, thread, ..
            } => {
                // a carried thread payload already holds the server's reply count
                append_reply(session, message, thread.is_none());
            }
            Event::MessageRead {
                user,
                parent_message_id: Some(parent_id),
                last_read_message_id,
                created_at,
                ..
            } => {
                if let Some(read) = session.ensure_thread_read(parent_id, &user.id) {
                    read.last_read_at = Some(*created_at);
                    if last_read_message_id.is_some() {
                        read.last_read_message_id = last_read_message_id.clone();
                    }
                    read.unread_messages_count = 0;
                }
            }
            Event::NotificationMarkUnread {
                user,
                parent_message_id: Some(parent_id),
                last_read_at,
                last_read_message_id,
                unread_messages,
                ..
            } => {
                if let Some(read) = session.ensure_thread_read(parent_id, &user.id) {
                    read.last_read_at = *last_read_at;
                    read.last_read_message_id = last_read_message_id.clone();
                    read.unread_messages_count = *unread_messages;
                }
            }
            Event::MessageDeleted {
                message,
                hard_delete,
                created_at,
                ..
            } => {
                handle_deleted(session, message, *hard_delete, *created_at);
            }
            Event::MessageUpdated {
                message,
                created_at,
                ..
            } => {
                let edited = session
                    .committed_message(&message.id)
                    .is_some_and(|before| before.text != message.text);
                if let (true, Some(parent_id)) = (edited, &message.parent_id) {
                    touch(session, parent_id, *created_at);
                }
            }
            Event::ChannelDeleted { cid, .. } | Event::ChannelTruncated { cid, .. } => {
                delete_channel_threads(session, cid);
            }
            _ => {}
        }
        Some(event)
    }
}

fn append_reply(session: &mut Session<'_>, message: &MessagePayload, bump_reply_count: bool) {
    let Some(parent_id) = &message.parent_id else {
        return;
    };
    // both the channel event and the thread notification carry the reply
    if !session.is_newly_inserted(&message.id) {
        return;
    }

    let counts_for_viewer = match (session.current_user(), session.message(&message.id)) {
        (Some(viewer), Some(stored)) => {
            unread::counts_as_thread_unread(stored, viewer).then(|| viewer.id.clone())
        }
        _ => None,
    };

    let Some(thread) = session.thread_mut(parent_id) else {
        return;
    };
    if !thread.latest_replies.contains(&message.id) {
        thread.latest_replies.push(message.id.clone());
    }
    if bump_reply_count {
        thread.reply_count += 1;
    }
    thread.updated_at = Some(message.created_at);

    if let Some(viewer_id) = counts_for_viewer {
        if let Some(read) = session.ensure_thread_read(parent_id, &viewer_id) {
            read.unread_messages_count += 1;
        }
    }
}

fn handle_deleted(
    session: &mut Session<'_>,
    message: &MessagePayload,
    hard_delete: bool,
    at: DateTime<Utc>,
) {
    if session.thread(&message.id).is_some() {
        if hard_delete {
            session.delete_thread(&message.id);
            debug!(parent_id = %message.id, "threads: parent hard-deleted, thread dropped");
        } else {
            touch(session, &message.id, at);
        }
    }

    let Some(parent_id) = &message.parent_id else {
        return;
    };
    if let Some(thread) = session.thread_mut(parent_id) {
        if hard_delete {
            thread.latest_replies.retain(|id| id != &message.id);
        }
        thread.updated_at = Some(at);
    }
}

fn touch(session: &mut Session<'_>, parent_id: &MessageId, at: DateTime<Utc>) {
    if let Some(thread) = session.thread_mut(parent_id) {
        thread.updated_at = Some(at);
    }
}

fn delete_channel_threads(session: &mut Session<'_>, cid: &ChannelId) {
    let removed = session.delete_threads_in_channel(cid);
    if removed > 0 {
        debug!(cid = %cid, removed, "threads: dropped threads of channel");
    }
}

#[cfg(test)]
#[path = "tests/thread_tests.rs"]
mod tests;
