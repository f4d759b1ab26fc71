//! Subscription types for live store updates.

use crate::error::StoreError;
use crate::types::LogRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for a subscription.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Max buffered records before dropping subscriber.
    /// Default: 1000
    pub buffer_size: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self { buffer_size: 1000 }
    }
}

impl SubscriptionConfig {
    /// Largest accepted `buffer_size`. Queues are preallocated.
    pub const MAX_BUFFER_SIZE: usize = 1 << 20;

    /// Reject buffer sizes outside `1..=MAX_BUFFER_SIZE`.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.buffer_size == 0 || self.buffer_size > Self::MAX_BUFFER_SIZE {
            return Err(StoreError::InvalidInput(format!(
                "buffer_size must be between 1 and {}, got {}",
                Self::MAX_BUFFER_SIZE,
                self.buffer_size
            )));
        }
        Ok(())
    }

    /// Capacity actually allocated for a queue, clamped into the valid range.
    pub fn effective_buffer_size(&self) -> usize {
        self.buffer_size.clamp(1, Self::MAX_BUFFER_SIZE)
    }
}

/// Messages pushed to an observer connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Recent history, sent once when the connection becomes active.
    Initial(Vec<LogRecord>),

    /// One newly inserted record.
    Update(LogRecord),
}

/// Why a subscription was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Receiver went away.
    Disconnected,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to manage a subscription.
///
/// Once the registry drops the subscription, receive calls report
/// disconnection after the buffered records are drained.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive records.
    pub receiver: crossbeam_channel::Receiver<Arc<LogRecord>>,
}

impl SubscriptionHandle {
    /// Receive the next record (blocking).
    pub fn recv(&self) -> Result<Arc<LogRecord>, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a record (non-blocking).
    pub fn try_recv(&self) -> Result<Arc<LogRecord>, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<Arc<LogRecord>, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered, without blocking.
    pub fn drain(&self) -> Vec<Arc<LogRecord>> {
        self.receiver.try_iter().collect()
    }
}
