use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::join_all;
use shared::domain::{ChannelId, MessageId};
use storage::Session;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const MAX_DELIVERIES_PER_REPORT: usize = 100;

/// Receives "delivered to this device" submissions from the middleware chain.
pub trait DeliveryTracker: Send + Sync {
    fn submit_for_delivery(&self, cid: &ChannelId, message_id: &MessageId);
    fn cancel(&self, cid: &ChannelId);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredMessage {
    pub cid: ChannelId,
    pub message_id: MessageId,
}

/// Outbound "mark delivered" call.
#[async_trait]
pub trait DeliveryReporter: Send + Sync {
    async fn mark_delivered(&self, deliveries: &[DeliveredMessage]) -> Result<()>;
}

pub struct MissingDeliveryReporter;

#[async_trait]
impl DeliveryReporter for MissingDeliveryReporter {
    async fn mark_delivered(&self, _deliveries: &[DeliveredMessage]) -> Result<()> {
        Err(anyhow!("delivery reporter is unavailable"))
    }
}

/// Tracker that discards everything; for replicas without delivery receipts.
pub struct NoopDeliveryTracker;

impl DeliveryTracker for NoopDeliveryTracker {
    fn submit_for_delivery(&self, _cid: &ChannelId, _message_id: &MessageId) {}

    fn cancel(&self, _cid: &ChannelId) {}
}

/// Batches delivery submissions per channel and reports them on flush.
///
/// Only the latest submitted message per channel is kept; acknowledging it
/// covers everything before it.
pub struct ChannelDeliveryTracker {
    reporter: Arc<dyn DeliveryReporter>,
    pending: Mutex<BTreeMap<ChannelId, MessageId>>,
}

impl ChannelDeliveryTracker {
    pub fn new(reporter: Arc<dyn DeliveryReporter>) -> Self {
        Self {
            reporter,
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn pending(&self) -> Vec<DeliveredMessage> {
        self.lock()
            .iter()
            .map(|(cid, message_id)| DeliveredMessage {
                cid: cid.clone(),
                message_id: message_id.clone(),
            })
            .collect()
    }

    /// Reports every pending delivery. Failed batches are queued again unless a
    /// newer message for the same channel arrived meanwhile.
    pub async fn flush(&self) -> Result<usize> {
        let deliveries: Vec<DeliveredMessage> = {
            let mut pending = self.lock();
            std::mem::take(&mut *pending)
                .into_iter()
                .map(|(cid, message_id)| DeliveredMessage { cid, message_id })
                .collect()
        };
        if deliveries.is_empty() {
            return Ok(0);
        }

        let batches: Vec<&[DeliveredMessage]> =
            deliveries.chunks(MAX_DELIVERIES_PER_REPORT).collect();
        let results = join_all(
            batches
                .iter()
                .map(|batch| self.reporter.mark_delivered(batch)),
        )
        .await;

        let mut reported = 0;
        let mut first_error = None;
        for (batch, result) in batches.iter().zip(results) {
            match result {
                Ok(()) => reported += batch.len(),
                Err(err) => {
                    warn!(count = batch.len(), error = %err, "delivery: report failed, requeueing");
                    let mut pending = self.lock();
                    for delivery in batch.iter() {
                        pending
                            .entry(delivery.cid.clone())
                            .or_insert_with(|| delivery.message_id.clone());
                    }
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) if reported == 0 => Err(err),
            _ => Ok(reported),
        }
    }

    /// Flushes on a fixed interval until the returned task is aborted.
    pub fn spawn_flush_loop(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match self.flush().await {
                    Ok(0) => {}
                    Ok(count) => info!(count, "delivery: reported delivered messages"),
                    Err(err) => debug!(error = %err, "delivery: flush failed"),
                }
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ChannelId, MessageId>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeliveryTracker for ChannelDeliveryTracker {
    fn submit_for_delivery(&self, cid: &ChannelId, message_id: &MessageId) {
        self.lock().insert(cid.clone(), message_id.clone());
    }

    fn cancel(&self, cid: &ChannelId) {
        if self.lock().remove(cid).is_some() {
            debug!(cid = %cid, "delivery: cancelled pending submission");
        }
    }
}

/// Whether a stored message should be acknowledged as delivered to this device.
pub fn should_mark_delivered(
    session: &Session<'_>,
    cid: &ChannelId,
    message_id: &MessageId,
) -> bool {
    let (Some(viewer), Some(channel), Some(message)) = (
        session.current_user(),
        session.channel(cid),
        session.message(message_id),
    ) else {
        return false;
    };

    if !channel.config.delivery_events
        || channel.is_hidden
        || viewer.has_muted_channel(cid)
        || !viewer.delivery_receipts_enabled
        || message.is_thread_reply_hidden_from_channel()
        || message.user_id == viewer.id
        || message.is_shadowed
        || message.is_deleted()
        || viewer.has_muted_user(&message.user_id)
    {
        return false;
    }

    match session.channel_read(cid, &viewer.id) {
        Some(read) => {
            let after_read = read
                .last_read_at
                .map_or(true, |last_read_at| message.created_at > last_read_at);
            let after_delivered = read
                .last_delivered_at
                .map_or(true, |delivered_at| message.created_at > delivered_at);
            after_read && after_delivered
        }
        None => true,
    }
}

#[cfg(test)]
#[path = "tests/delivery_tests.rs"]
mod tests;
