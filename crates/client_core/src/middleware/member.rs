use chrono::{DateTime, Utc};
use shared::{
    domain::{ChannelId, UserId},
    events::Event,
    protocol::MemberPayload,
};
use storage::Session;
use tracing::info;

use super::EventMiddleware;

/// Channel membership, including the invitation variants.
pub struct MemberMiddleware;

impl EventMiddleware for MemberMiddleware {
    fn handle(&self, event: Event, session: &mut Session<'_>) -> Option<Event> {
        match &event {
            Event::MemberAdded {
                cid,
                member,
                created_at,
                ..
            } => {
                refresh_membership(session, cid, member);
                session
                    .ensure_channel_read(cid, &member.user.id)
                    .mark_read(*created_at, None);
            }
            Event::MemberUpdated { cid, member, .. }
            | Event::NotificationAddedToChannel { cid, member, .. }
            | Event::NotificationInvited { cid, member, .. }
            | Event::NotificationInviteAccepted { cid, member, .. }
            | Event::NotificationInviteRejected { cid, member, .. } => {
                refresh_membership(session, cid, member);
            }
            Event::MemberRemoved {
                cid,
                user,
                created_at,
                ..
            }
            | Event::NotificationRemovedFromChannel {
                cid,
                user,
                created_at,
                ..
            } => {
                remove_member(session, cid, &user.id, *created_at);
            }
            _ => {}
        }
        Some(event)
    }
}

fn refresh_membership(session: &mut Session<'_>, cid: &ChannelId, member: &MemberPayload) {
    if !session.is_current_user(&member.user.id) {
        return;
    }
    let channel = session.ensure_channel(cid);
    if member.invite_rejected_at.is_some() {
        channel.membership = None;
    } else {
        channel.membership = Some(member.user.id.clone());
    }
}

fn remove_member(session: &mut Session<'_>, cid: &ChannelId, user_id: &UserId, at: DateTime<Utc>) {
    session.remove_member(cid, user_id);
    if !session.is_current_user(user_id) {
        return;
    }

    // no further updates will arrive for this channel, so it must not look caught up
    let read = session.ensure_channel_read(cid, user_id);
    read.last_read_at = None;
    read.last_read_message_id = None;
    info!(cid = %cid, removed_at = %at, "members: current user left channel");
}

#[cfg(test)]
#[path = "tests/member_tests.rs"]
mod tests;
