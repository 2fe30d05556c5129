use shared::events::Event;
use storage::Session;
use tracing::info;

use super::EventMiddleware;
use crate::unread;

/// Bans and moderator bulk deletion of a user's messages.
pub struct ModerationMiddleware;

impl EventMiddleware for ModerationMiddleware {
    fn handle(&self, event: Event, session: &mut Session<'_>) -> Option<Event> {
        match &event {
            Event::UserBanned {
                cid: Some(cid),
                user,
                expiration,
                shadow,
                ..
            } => {
                let member = session.ensure_member(cid, &user.id);
                if *shadow {
                    member.is_shadow_banned = true;
                } else {
                    member.is_banned = true;
                }
                member.ban_expires_at = *expiration;
            }
            Event::UserBanned {
                cid: None, user, ..
            } => {
                if let Some(stored) = session.user_mut(&user.id) {
                    stored.is_banned = true;
                }
            }
            Event::UserUnbanned {
                cid: Some(cid),
                user,
                ..
            } => {
                session.ensure_member(cid, &user.id).clear_ban();
            }
            Event::UserUnbanned {
                cid: None, user, ..
            } => {
                if let Some(stored) = session.user_mut(&user.id) {
                    stored.is_banned = false;
                }
            }
            Event::UserMessagesDeleted {
                cid,
                user,
                hard_delete,
                created_at,
            } => {
                let ids = session.message_ids_by_author(&user.id, cid.as_ref());
                let mut affected = 0;
                for id in &ids {
                    let before = session.message(id).cloned();
                    let changed = if *hard_delete {
                        session.mark_message_hard_deleted(id)
                    } else {
                        session.mark_message_soft_deleted(id, *created_at)
                    };
                    if let (true, Some(before)) = (changed, before) {
                        unread::release(session, &before);
                        affected += 1;
                    }
                }
                info!(
                    user_id = %user.id,
                    cid = ?cid,
                    hard_delete = *hard_delete,
                    affected,
                    "moderation: deleted user messages"
                );
            }
            _ => {}
        }
        Some(event)
    }
}

#[cfg(test)]
#[path = "tests/moderation_tests.rs"]
mod tests;
