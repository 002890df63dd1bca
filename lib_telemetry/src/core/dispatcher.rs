//! # Notification Bus
//!
//! Ordered, synchronous fan-out of each generated record to every registered
//! subscriber, in registration order, before the generating call returns.
//!
//! ## Snapshot-then-iterate
//!
//! `notify` clones the subscriber list (a vector of `Arc`s) and releases the
//! lock before invoking anyone. A callback may therefore register or remove
//! subscribers, including itself, without deadlocking. Such changes apply
//! from the next record on: removing S2 from inside S1 still delivers the
//! in-flight record to S2 and S3 exactly once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::core::record::TelemetryRecord;

type Listener = Arc<dyn Fn(&TelemetryRecord) + Send + Sync>;
type ListenerList = Mutex<Vec<(u64, Listener)>>;

fn lock(listeners: &ListenerList) -> MutexGuard<'_, Vec<(u64, Listener)>> {
    listeners.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The subscriber registry and broadcaster.
pub struct NotificationBus {
    listeners: Arc<ListenerList>,
    next_id: AtomicU64,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a subscriber. The returned handle removes it; removal is
    /// idempotent.
    pub fn listen<F>(&self, listener: F) -> Unsubscriber
    where
        F: Fn(&TelemetryRecord) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).push((id, Arc::new(listener)));
        log::debug!("Subscriber {} registered", id);
        Unsubscriber {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Delivers `record` to every subscriber registered at call time.
    pub fn notify(&self, record: &TelemetryRecord) {
        let snapshot: Vec<Listener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(record);
        }
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        lock(&self.listeners).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes one subscriber from its bus.
///
/// Dropping the handle does not unsubscribe.
#[derive(Debug, Clone)]
pub struct Unsubscriber {
    id: u64,
    listeners: Weak<ListenerList>,
}

impl Unsubscriber {
    /// Removes the subscriber. Calling it again, or after the bus is gone, is a
    /// no-op.
    pub fn unsubscribe(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            let mut guard = lock(&listeners);
            let before = guard.len();
            guard.retain(|(id, _)| *id != self.id);
            if guard.len() != before {
                log::debug!("Subscriber {} removed", self.id);
            }
        }
    }
}
