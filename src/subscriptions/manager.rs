//! Subscriber registry.

use crate::types::LogRecord;
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::types::{DropReason, SubscriptionConfig, SubscriptionHandle, SubscriptionId};

/// One registered observer, as seen by the dispatcher.
///
/// Cheap to clone: it is the id plus the sending half of the queue.
#[derive(Clone)]
pub struct Subscriber {
    id: SubscriptionId,
    sender: Sender<Arc<LogRecord>>,
}

impl Subscriber {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Try to enqueue a record without blocking.
    pub(crate) fn try_deliver(&self, record: &Arc<LogRecord>) -> Result<(), DropReason> {
        match self.sender.try_send(Arc::clone(record)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(DropReason::BufferOverflow),
            Err(TrySendError::Disconnected(_)) => Err(DropReason::Disconnected),
        }
    }
}

/// Tracks connected observers and their delivery queues.
pub struct SubscriptionManager {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscriber>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    /// Defaults applied by `subscribe_default`.
    default_config: SubscriptionConfig,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    pub fn new() -> Self {
        Self::with_config(SubscriptionConfig::default())
    }

    /// Create a new subscription manager with custom defaults.
    pub fn with_config(default_config: SubscriptionConfig) -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            default_config,
        }
    }

    /// Register a subscriber with the manager's default config.
    pub fn subscribe_default(&self) -> SubscriptionHandle {
        self.subscribe(self.default_config.clone())
    }

    /// Register a new subscriber.
    ///
    /// The entry is inserted whole under the write lock, so a concurrent
    /// `snapshot` either sees it fully or not at all.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        // Zero would make a rendezvous channel; huge values would preallocate.
        let capacity = config.effective_buffer_size();
        let (sender, receiver) = bounded(capacity);

        self.subscriptions
            .write()
            .insert(id, Subscriber { id, sender });
        debug!(subscription = id.0, buffer = capacity, "subscriber registered");

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up. Safe to call repeatedly or for unknown ids.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.remove(id, DropReason::Unsubscribed);
    }

    /// Remove a subscriber, dropping its sender. Returns whether it was present.
    pub fn remove(&self, id: SubscriptionId, reason: DropReason) -> bool {
        let removed = self.subscriptions.write().remove(&id).is_some();
        if removed {
            debug!(subscription = id.0, ?reason, "subscriber removed");
        }
        removed
    }

    /// Point-in-time membership, ordered by id.
    pub fn snapshot(&self) -> Vec<Subscriber> {
        let mut subs: Vec<Subscriber> = self.subscriptions.read().values().cloned().collect();
        subs.sort_by_key(|s| s.id);
        subs
    }

    /// Whether a subscriber is still registered.
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.subscriptions.read().contains_key(&id)
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
