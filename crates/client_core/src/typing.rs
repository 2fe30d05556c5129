use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use chrono::Utc;
use shared::{
    domain::{ChannelId, UserId},
    events::Event,
};
use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle};
use tracing::debug;

pub const DEFAULT_TYPING_TIMEOUT: Duration = Duration::from_secs(15);

/// Users currently typing, per channel. Lives in memory only.
#[derive(Debug, Clone, Default)]
pub struct TypingRegistry {
    inner: Arc<Mutex<BTreeMap<ChannelId, BTreeSet<UserId>>>>,
}

impl TypingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, cid: &ChannelId, user_id: &UserId) -> bool {
        self.lock()
            .entry(cid.clone())
            .or_default()
            .insert(user_id.clone())
    }

    pub fn remove(&self, cid: &ChannelId, user_id: &UserId) -> bool {
        let mut channels = self.lock();
        let Some(users) = channels.get_mut(cid) else {
            return false;
        };
        let removed = users.remove(user_id);
        if users.is_empty() {
            channels.remove(cid);
        }
        removed
    }

    pub fn typing_users(&self, cid: &ChannelId) -> BTreeSet<UserId> {
        self.lock().get(cid).cloned().unwrap_or_default()
    }

    pub fn is_typing(&self, cid: &ChannelId, user_id: &UserId) -> bool {
        self.lock()
            .get(cid)
            .is_some_and(|users| users.contains(user_id))
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ChannelId, BTreeSet<UserId>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Posted by an expired typing timer. Only the newest timer for a user is honoured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingTimeout {
    pub cid: ChannelId,
    pub user_id: UserId,
    pub generation: u64,
}

struct PendingTimer {
    generation: u64,
    task: JoinHandle<()>,
}

/// Schedules typing clean-ups for remote users.
///
/// Timers only hold a sender; whoever owns the receiving end turns a
/// [`TypingTimeout`] into a clean-up event with [`TypingWatchdog::expire`].
/// Dropping the watchdog aborts every pending timer.
pub struct TypingWatchdog {
    timeout: Duration,
    timeouts: mpsc::UnboundedSender<TypingTimeout>,
    next_generation: AtomicU64,
    timers: Mutex<HashMap<(ChannelId, UserId), PendingTimer>>,
}

impl TypingWatchdog {
    pub fn new(timeout: Duration) -> (Self, mpsc::UnboundedReceiver<TypingTimeout>) {
        let (timeouts, receiver) = mpsc::unbounded_channel();
        let watchdog = Self {
            timeout,
            timeouts,
            next_generation: AtomicU64::new(1),
            timers: Mutex::new(HashMap::new()),
        };
        (watchdog, receiver)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Restarts the timer for `user_id` in `cid`.
    pub fn schedule(&self, cid: &ChannelId, user_id: &UserId) {
        let Ok(runtime) = Handle::try_current() else {
            debug!(cid = %cid, user_id = %user_id, "typing: no runtime, timer not scheduled");
            return;
        };

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let timeout = TypingTimeout {
            cid: cid.clone(),
            user_id: user_id.clone(),
            generation,
        };
        let sender = self.timeouts.clone();
        let delay = self.timeout;
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send(timeout);
        });

        if let Some(previous) = self
            .lock()
            .insert((cid.clone(), user_id.clone()), PendingTimer { generation, task })
        {
            previous.task.abort();
        }
    }

    pub fn cancel(&self, cid: &ChannelId, user_id: &UserId) -> bool {
        match self.lock().remove(&(cid.clone(), user_id.clone())) {
            Some(pending) => {
                pending.task.abort();
                true
            }
            None => false,
        }
    }

    /// Turns a fired timer into a clean-up event, or `None` if it was superseded.
    pub fn expire(&self, timeout: TypingTimeout) -> Option<Event> {
        let key = (timeout.cid, timeout.user_id);
        let mut timers = self.lock();
        if timers.get(&key)?.generation != timeout.generation {
            return None;
        }
        timers.remove(&key);
        let (cid, user_id) = key;
        Some(Event::TypingCleanUp {
            cid,
            user_id,
            created_at: Utc::now(),
        })
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(ChannelId, UserId), PendingTimer>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TypingWatchdog {
    fn drop(&mut self) {
        for (_, pending) in self.lock().drain() {
            pending.task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/typing_tests.rs"]
mod tests;
