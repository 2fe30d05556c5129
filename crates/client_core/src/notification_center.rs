use std::sync::Arc;

use shared::events::Event;
use storage::{Store, StoreError};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::{
    middleware::EventMiddlewareChain,
    typing::{TypingTimeout, TypingWatchdog},
};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Applies inbound events to the store and publishes whatever survives the chain.
///
/// Each event gets its own transaction. Publishing happens after the commit,
/// so subscribers always observe state that already contains the event.
pub struct EventNotificationCenter {
    store: Arc<Store>,
    chain: EventMiddlewareChain,
    events: broadcast::Sender<Event>,
    watchdog: Option<Arc<TypingWatchdog>>,
}

impl EventNotificationCenter {
    pub fn new(store: Arc<Store>, chain: EventMiddlewareChain) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            chain,
            events,
            watchdog: None,
        }
    }

    /// The watchdog whose timeouts [`Self::handle_typing_timeout`] resolves.
    pub fn with_watchdog(mut self, watchdog: Arc<TypingWatchdog>) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn stream(&self) -> BroadcastStream<Event> {
        BroadcastStream::new(self.events.subscribe())
    }

    /// Runs one event through the chain and commits its writes.
    ///
    /// Returns the forwarded event, or `None` when a middleware swallowed it.
    pub fn process(&self, event: Event) -> Result<Option<Event>, StoreError> {
        let kind = event.kind();
        let forwarded = self
            .store
            .write(|session| Ok(self.chain.process(event, session)))?;

        match &forwarded {
            Some(event) => {
                // no subscribers is fine
                let _ = self.events.send(event.clone());
            }
            None => debug!(event_type = kind, "notification center: event swallowed"),
        }
        Ok(forwarded)
    }

    /// Applies a fired typing timer; stale timers are ignored.
    pub fn handle_typing_timeout(
        &self,
        timeout: TypingTimeout,
    ) -> Result<Option<Event>, StoreError> {
        let Some(watchdog) = &self.watchdog else {
            return Ok(None);
        };
        match watchdog.expire(timeout) {
            Some(cleanup) => self.process(cleanup),
            None => Ok(None),
        }
    }

    /// Drains inbound events and typing timeouts until the inbound side closes.
    pub async fn run(
        &self,
        mut inbound: mpsc::Receiver<Event>,
        mut timeouts: mpsc::UnboundedReceiver<TypingTimeout>,
    ) {
        let mut processed = 0usize;
        loop {
            tokio::select! {
                maybe_event = inbound.recv() => {
                    let Some(event) = maybe_event else {
                        break;
                    };
                    let kind = event.kind();
                    if let Err(err) = self.process(event) {
                        warn!(event_type = kind, error = %err, "notification center: event not applied");
                    }
                    processed += 1;
                }
                Some(timeout) = timeouts.recv() => {
                    if let Err(err) = self.handle_typing_timeout(timeout) {
                        warn!(error = %err, "notification center: typing clean-up not applied");
                    }
                }
            }
        }
        info!(processed, "notification center: inbound stream closed");
    }
}

#[cfg(test)]
#[path = "tests/notification_center_tests.rs"]
mod tests;
