//! The reconciliation pipeline: every inbound event runs through an ordered list
//! of middlewares inside one store transaction.
//!
//! A middleware returns the (possibly rewritten) event to pass it on, or `None`
//! to swallow it. Swallowing stops the chain and nothing is forwarded, but
//! writes made by earlier middlewares in the same transaction are kept.

use std::sync::Arc;

use shared::events::Event;
use storage::Session;

use crate::{
    delivery::{DeliveryTracker, NoopDeliveryTracker},
    typing::{TypingRegistry, TypingWatchdog},
};

mod channel_read;
mod channel_visibility;
mod delivery;
mod draft;
mod member;
mod moderation;
mod payload_upsert;
mod reminder;
mod restricted_visibility;
mod thread;
mod typing;

pub use channel_read::ChannelReadMiddleware;
pub use channel_visibility::ChannelVisibilityMiddleware;
pub use delivery::DeliveryMiddleware;
pub use draft::DraftMiddleware;
pub use member::MemberMiddleware;
pub use moderation::ModerationMiddleware;
pub use payload_upsert::PayloadUpsertMiddleware;
pub use reminder::ReminderMiddleware;
pub use restricted_visibility::RestrictedVisibilityMiddleware;
pub use thread::ThreadMiddleware;
pub use typing::TypingStateMiddleware;

pub trait EventMiddleware: Send + Sync {
    /// Applies this middleware's rules. Events it does not care about come back unchanged.
    fn handle(&self, event: Event, session: &mut Session<'_>) -> Option<Event>;
}

/// Collaborators the standard chain needs.
pub struct ChainDependencies {
    pub typing: TypingRegistry,
    pub watchdog: Option<Arc<TypingWatchdog>>,
    pub delivery: Arc<dyn DeliveryTracker>,
}

impl Default for ChainDependencies {
    fn default() -> Self {
        Self {
            typing: TypingRegistry::new(),
            watchdog: None,
            delivery: Arc::new(NoopDeliveryTracker),
        }
    }
}

pub struct EventMiddlewareChain {
    middlewares: Vec<Box<dyn EventMiddleware>>,
}

impl EventMiddlewareChain {
    pub fn new(middlewares: Vec<Box<dyn EventMiddleware>>) -> Self {
        Self { middlewares }
    }

    /// The production order. Payload upsert must stay first.
    pub fn standard(deps: ChainDependencies) -> Self {
        Self::new(vec![
            Box::new(PayloadUpsertMiddleware),
            Box::new(RestrictedVisibilityMiddleware),
            Box::new(TypingStateMiddleware::new(deps.typing, deps.watchdog)),
            Box::new(ChannelReadMiddleware),
            Box::new(ChannelVisibilityMiddleware),
            Box::new(MemberMiddleware),
            Box::new(ModerationMiddleware),
            Box::new(DeliveryMiddleware::new(deps.delivery)),
            Box::new(ThreadMiddleware),
            Box::new(DraftMiddleware),
            Box::new(ReminderMiddleware),
        ])
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub fn process(&self, event: Event, session: &mut Session<'_>) -> Option<Event> {
        self.middlewares
            .iter()
            .try_fold(event, |event, middleware| middleware.handle(event, session))
    }
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
