//! # logcast
//!
//! An in-memory store for HTTP log entries that answers time-range queries
//! and pushes every new entry to live observers.
//!
//! ## Core Concepts
//!
//! - **Records**: Immutable entries with a store-assigned id and timestamp
//! - **Subscriptions**: Bounded per-observer queues fed on every insert
//! - **Queries**: Point-in-time snapshots over a timestamp range
//! - **Connections**: An initial history batch followed by live updates
//!
//! ## Example
//!
//! ```ignore
//! use logcast::{ConnectionManager, QueryGateway, Store, StoreConfig};
//!
//! let store = Store::shared(StoreConfig::default());
//! let queries = QueryGateway::new(store.clone());
//! let connections = ConnectionManager::new(store.clone());
//!
//! // A peer connects and gets recent history, then live updates
//! let handle = connections.accept(transport)?;
//!
//! // Record an entry; every connected peer receives it
//! store.insert(404, "Not Found")?;
//!
//! // Query the last 24 hours
//! let logs = queries.get_logs(None, None)?;
//! ```

pub mod connection;
pub mod error;
pub mod query;
pub mod records;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use connection::{
    ChannelTransport, ClientMessage, Connection, ConnectionConfig, ConnectionHandle,
    ConnectionManager, ConnectionState, Frame, Transport, WireFormat,
};
pub use error::{Result, StoreError};
pub use query::{LogQuery, QueryConfig, QueryGateway, DEFAULT_WINDOW};
pub use records::RecordLog;
pub use store::{Store, StoreConfig};
pub use subscriptions::{
    BroadcastReport, Dispatcher, DropReason, ServerMessage, Subscriber, SubscriptionConfig,
    SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
pub use types::*;
