//! Fan-out of newly inserted records.

use crate::types::LogRecord;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

use super::manager::SubscriptionManager;

/// Outcome of one broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers the record was enqueued for.
    pub delivered: usize,
    /// Subscribers that were dropped instead.
    pub dropped: usize,
}

/// Pushes each record to every registered subscriber without blocking.
///
/// A subscriber whose queue is full or whose receiver is gone loses the
/// record and is removed from the registry. Nothing is retried and no
/// failure reaches the writer.
#[derive(Default)]
pub struct Dispatcher {
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `record` to the registry's current members.
    pub fn broadcast(
        &self,
        registry: &SubscriptionManager,
        record: &Arc<LogRecord>,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for sub in registry.snapshot() {
            match sub.try_deliver(record) {
                Ok(()) => report.delivered += 1,
                Err(reason) => {
                    warn!(
                        subscription = sub.id().0,
                        record = record.id.0,
                        ?reason,
                        "dropping subscriber"
                    );
                    registry.remove(sub.id(), reason);
                    report.dropped += 1;
                }
            }
        }

        self.delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.dropped.fetch_add(report.dropped as u64, Ordering::Relaxed);
        report
    }

    /// Total successful enqueues so far.
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Total subscriber drops so far.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
