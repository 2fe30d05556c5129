//! Unread eligibility shared by channel reads, thread reads and delivery tracking.

use shared::domain::{MessageId, MessageType};
use storage::{
    model::{ChannelRead, CurrentUser, Message},
    Session,
};

/// Which counter a message bumps on its reader's [`ChannelRead`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreadKind {
    Message,
    SilentMessage,
    ThreadReply,
}

/// Decides whether `message` is unread for `viewer`, and in which counter.
///
/// `None` covers everything that never counts: own messages, muted authors or
/// channels, system-like message types, shadowed or deleted messages, messages
/// the viewer may not see, and messages already covered by the read cursor.
pub fn unread_kind(
    message: &Message,
    viewer: &CurrentUser,
    read: Option<&ChannelRead>,
) -> Option<UnreadKind> {
    if message.user_id == viewer.id
        || viewer.has_muted_user(&message.user_id)
        || viewer.has_muted_channel(&message.cid)
        || is_system_like(message.kind)
        || message.is_shadowed
        || message.is_deleted()
        || !message.is_visible_to(&viewer.id)
        || is_covered_by_cursor(message, read)
    {
        return None;
    }

    if message.is_thread_reply_hidden_from_channel() {
        Some(UnreadKind::ThreadReply)
    } else if message.is_silent {
        Some(UnreadKind::SilentMessage)
    } else {
        Some(UnreadKind::Message)
    }
}

/// True when the message moves `unreadMessagesCount`.
pub fn counts_as_unread(
    message: &Message,
    viewer: &CurrentUser,
    read: Option<&ChannelRead>,
) -> bool {
    unread_kind(message, viewer, read) == Some(UnreadKind::Message)
}

/// Thread replies use the same rules minus the channel-list ones.
pub fn counts_as_thread_unread(message: &Message, viewer: &CurrentUser) -> bool {
    message.user_id != viewer.id
        && !viewer.has_muted_user(&message.user_id)
        && !is_system_like(message.kind)
        && !message.is_shadowed
        && !message.is_deleted()
        && message.is_visible_to(&viewer.id)
}

fn is_system_like(kind: MessageType) -> bool {
    matches!(
        kind,
        MessageType::System | MessageType::Ephemeral | MessageType::Error | MessageType::Deleted
    )
}

fn is_covered_by_cursor(message: &Message, read: Option<&ChannelRead>) -> bool {
    read.and_then(|read| read.last_read_at)
        .is_some_and(|last_read_at| message.created_at <= last_read_at)
}

pub(crate) fn bump(read: &mut ChannelRead, kind: UnreadKind) {
    match kind {
        UnreadKind::Message => read.unread_messages_count += 1,
        UnreadKind::SilentMessage => read.unread_silent_messages_count += 1,
        UnreadKind::ThreadReply => read.unread_thread_replies_count += 1,
    }
}

pub(crate) fn drop_one(read: &mut ChannelRead, kind: UnreadKind) {
    let counter = match kind {
        UnreadKind::Message => &mut read.unread_messages_count,
        UnreadKind::SilentMessage => &mut read.unread_silent_messages_count,
        UnreadKind::ThreadReply => &mut read.unread_thread_replies_count,
    };
    *counter = counter.saturating_sub(1);
}

/// Takes back whatever `before` added to the viewer's read for its channel.
///
/// `before` is the message as it stood before the change that made it stop
/// counting.
pub(crate) fn release(session: &mut Session<'_>, before: &Message) -> Option<UnreadKind> {
    let viewer = session.current_user()?;
    let read = session.channel_read(&before.cid, &viewer.id)?;
    let kind = unread_kind(before, viewer, Some(read))?;
    let viewer_id = viewer.id.clone();
    drop_one(session.channel_read_mut(&before.cid, &viewer_id)?, kind);
    Some(kind)
}

/// Counts a stored message for the viewer if it is eligible right now.
pub(crate) fn claim(session: &mut Session<'_>, message_id: &MessageId) -> Option<UnreadKind> {
    let viewer = session.current_user()?;
    let message = session.message(message_id)?;
    let kind = unread_kind(message, viewer, session.channel_read(&message.cid, &viewer.id))?;
    let (cid, viewer_id) = (message.cid.clone(), viewer.id.clone());
    bump(session.ensure_channel_read(&cid, &viewer_id), kind);
    Some(kind)
}

#[cfg(test)]
#[path = "tests/unread_tests.rs"]
mod tests;
