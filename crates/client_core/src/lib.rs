//! Client-side event reconciliation: turns the server's event stream into
//! committed changes of the local replica.

pub mod config;
pub mod delivery;
pub mod middleware;
mod notification_center;
pub mod typing;
pub mod unread;

pub use config::{load_settings, load_settings_from, Settings};
pub use delivery::{
    ChannelDeliveryTracker, DeliveredMessage, DeliveryReporter, DeliveryTracker,
    MissingDeliveryReporter, NoopDeliveryTracker,
};
pub use middleware::{ChainDependencies, EventMiddleware, EventMiddlewareChain};
pub use notification_center::EventNotificationCenter;
pub use typing::{TypingRegistry, TypingTimeout, TypingWatchdog, DEFAULT_TYPING_TIMEOUT};

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, TimeZone, Utc};
    use shared::{
        domain::{ChannelId, MessageId, UserId},
        events::Event,
        protocol::{ChannelPayload, MessagePayload, UserPayload},
    };
    use storage::{Session, Store};

    use crate::middleware::EventMiddleware;

    pub const ME: &str = "me";

    pub fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0)
            .single()
            .expect("timestamp")
    }

    pub fn general() -> ChannelId {
        ChannelId::new("messaging", "general")
    }

    pub fn me() -> UserId {
        UserId::new(ME)
    }

    pub fn mid(id: &str) -> MessageId {
        MessageId::new(id)
    }

    pub fn store() -> Store {
        Store::for_user(me())
    }

    /// A store for "me" with `general` already present.
    pub fn store_with_channel() -> Store {
        let store = store();
        store
            .write(|session| session.save_channel(&ChannelPayload::new(general())))
            .expect("seed channel");
        store
    }

    pub fn message(id: &str, author: &str, secs: i64) -> MessagePayload {
        let mut message = MessagePayload::new(id, author, at(secs));
        message.cid = Some(general());
        message
    }

    pub fn reply(id: &str, parent: &str, author: &str, secs: i64) -> MessagePayload {
        let mut reply = message(id, author, secs);
        reply.parent_id = Some(mid(parent));
        reply
    }

    pub fn message_new(message: MessagePayload) -> Event {
        Event::MessageNew {
            cid: general(),
            user: message.user.clone(),
            created_at: message.created_at,
            message,
            channel: None,
            watcher_count: None,
            unread: None,
        }
    }

    pub fn message_deleted(message: MessagePayload, hard_delete: bool, secs: i64) -> Event {
        Event::MessageDeleted {
            cid: general(),
            user: Some(message.user.clone()),
            message,
            hard_delete,
            created_at: at(secs),
        }
    }

    pub fn message_updated(message: MessagePayload, secs: i64) -> Event {
        Event::MessageUpdated {
            cid: general(),
            user: Some(message.user.clone()),
            message,
            created_at: at(secs),
        }
    }

    pub fn message_read(user: &str, secs: i64) -> Event {
        Event::MessageRead {
            cid: general(),
            user: UserPayload::new(user),
            parent_message_id: None,
            last_read_message_id: None,
            thread: None,
            unread: None,
            created_at: at(secs),
        }
    }

    /// Runs `middlewares` in order against one committed transaction.
    pub fn run(
        store: &Store,
        middlewares: &[&dyn EventMiddleware],
        event: Event,
    ) -> Option<Event> {
        store
            .write(|session: &mut Session<'_>| {
                Ok(middlewares
                    .iter()
                    .try_fold(event, |event, middleware| middleware.handle(event, session)))
            })
            .expect("write")
    }

    pub fn unread_count(store: &Store, user: &str) -> u32 {
        store.read(|replica| {
            replica
                .channel_read(&general(), &UserId::new(user))
                .map_or(0, |read| read.unread_messages_count)
        })
    }
}
