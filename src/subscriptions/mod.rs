//! Subscription system for live store updates.
//!
//! This module provides in-process subscriptions to newly inserted records:
//! - A registry of subscribers, each with a bounded queue
//! - A dispatcher that fans records out without blocking the writer
//! - The message envelope pushed to observer connections
//!
//! Slow or dead subscribers are dropped rather than waited on.
//!
//! # Example
//!
//! ```ignore
//! let registry = SubscriptionManager::new();
//! let dispatcher = Dispatcher::new();
//!
//! let handle = registry.subscribe(SubscriptionConfig { buffer_size: 64 });
//! dispatcher.broadcast(&registry, &record);
//!
//! while let Ok(record) = handle.recv() {
//!     println!("{} {}", record.status_code, record.message);
//! }
//! ```

mod dispatcher;
mod manager;
mod types;

pub use dispatcher::{BroadcastReport, Dispatcher};
pub use manager::{Subscriber, SubscriptionManager};
pub use types::{
    DropReason, ServerMessage, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
};
