use shared::events::Event;
use storage::Session;
use tracing::info;

use super::EventMiddleware;

/// Hidden, truncated and deleted channel state.
pub struct ChannelVisibilityMiddleware;

impl EventMiddleware for ChannelVisibilityMiddleware {
    fn handle(&self, event: Event, session: &mut Session<'_>) -> Option<Event> {
        match &event {
            Event::ChannelHidden {
                cid,
                clear_history,
                created_at,
                ..
            } => {
                session.ensure_channel(cid).is_hidden = true;
                if *clear_history {
                    session.truncate_channel(cid, *created_at);
                }
            }
            Event::ChannelVisible { cid, .. } => {
                session.ensure_channel(cid).is_hidden = false;
            }
            Event::MessageNew { cid, message, .. }
            | Event::NotificationMessageNew { cid, message, .. } => {
                // a shadowed message must not reveal the channel
                if !message.shadowed {
                    if let Some(channel) = session.channel_mut(cid) {
                        channel.is_hidden = false;
                    }
                }
            }
            Event::ChannelTruncated {
                cid,
                channel,
                created_at,
                ..
            } => {
                let truncated_at = channel
                    .as_ref()
                    .and_then(|channel| channel.truncated_at)
                    .unwrap_or(*created_at);
                session.truncate_channel(cid, truncated_at);
                for read in session.channel_reads_in_mut(cid) {
                    read.clear_unread_counts();
                }
                info!(cid = %cid, "channel: truncated");
            }
            Event::ChannelDeleted {
                cid,
                channel,
                created_at,
            } => {
                let deleted_at = channel
                    .as_ref()
                    .and_then(|channel| channel.deleted_at)
                    .unwrap_or(*created_at);
                session.ensure_channel(cid).deleted_at = Some(deleted_at);
                info!(cid = %cid, "channel: deleted");
            }
            _ => {}
        }
        Some(event)
    }
}

#[cfg(test)]
#[path = "tests/channel_visibility_tests.rs"]
mod tests;
