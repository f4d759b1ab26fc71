//! Main Store struct tying the record log and subscriptions together.

use crate::error::Result;
use crate::records::RecordLog;
use crate::subscriptions::{
    Dispatcher, SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
use crate::types::{LogInput, LogRecord, RecordId, StoreStats, Timestamp, SAMPLE_LOGS};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

/// Store configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum retained records; the oldest are evicted first (None = unbounded).
    pub max_records: Option<usize>,

    /// Defaults for new subscriptions.
    pub subscription: SubscriptionConfig,

    /// Insert the canned sample records on construction.
    pub seed_samples: bool,
}

impl StoreConfig {
    /// Parse a configuration from JSON; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.subscription.validate()
    }
}

/// The in-memory log store.
///
/// Provides a unified interface for:
/// - Inserting records and fanning them out to subscribers
/// - Time-range scans over retained records
/// - Registering and removing subscribers
pub struct Store {
    /// Store configuration.
    config: StoreConfig,

    /// Record log.
    log: RecordLog,

    /// Subscriber registry.
    subscriptions: SubscriptionManager,

    /// Fan-out of new records.
    dispatcher: Dispatcher,

    /// Serializes id assignment, storage and fan-out.
    write_lock: Mutex<()>,
}

impl Store {
    /// Create a new store.
    pub fn new(config: StoreConfig) -> Self {
        let store = Self {
            log: RecordLog::with_retention(config.max_records),
            subscriptions: SubscriptionManager::with_config(config.subscription.clone()),
            dispatcher: Dispatcher::new(),
            write_lock: Mutex::new(()),
            config,
        };

        if store.config.seed_samples {
            store.seed_samples();
        }

        store
    }

    /// Create a store behind an `Arc`, ready to share with gateways and connections.
    pub fn shared(config: StoreConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    // --- Record Operations ---

    /// Insert a record and broadcast it to current subscribers.
    pub fn insert(&self, status_code: u16, message: impl Into<String>) -> Result<LogRecord> {
        self.append(LogInput::new(status_code, message))
    }

    /// Append a validated input. Returns the stored record.
    pub fn append(&self, input: LogInput) -> Result<LogRecord> {
        input.validate()?;
        let record = self.append_unchecked(input);
        Ok(LogRecord::clone(&record))
    }

    fn append_unchecked(&self, input: LogInput) -> Arc<LogRecord> {
        let _lock = self.write_lock.lock();

        let record = self.log.append(input);
        let report = self.dispatcher.broadcast(&self.subscriptions, &record);
        trace!(
            id = record.id.0,
            status = record.status_code,
            delivered = report.delivered,
            dropped = report.dropped,
            "record inserted"
        );

        record
    }

    /// Insert the canned sample records, in order.
    pub fn seed_samples(&self) -> Vec<LogRecord> {
        SAMPLE_LOGS
            .iter()
            .map(|(code, message)| {
                LogRecord::clone(&self.append_unchecked(LogInput::new(*code, *message)))
            })
            .collect()
    }

    /// All records with `start <= timestamp <= end`, ascending.
    ///
    /// An inverted range yields an empty result.
    pub fn scan(&self, start: Timestamp, end: Timestamp) -> Vec<LogRecord> {
        let snapshot = self.log.scan(start, end);
        snapshot.iter().map(|r| LogRecord::clone(r)).collect()
    }

    /// Get a record by ID.
    pub fn get_record(&self, id: RecordId) -> Option<LogRecord> {
        self.log.get(id).map(|r| LogRecord::clone(&r))
    }

    /// The most recent `count` records, ascending.
    pub fn latest(&self, count: usize) -> Vec<LogRecord> {
        self.log
            .latest(count)
            .iter()
            .map(|r| LogRecord::clone(r))
            .collect()
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    // --- Subscriptions ---

    /// Register a subscriber with the configured defaults.
    ///
    /// Only records inserted after this call are delivered.
    pub fn subscribe(&self) -> SubscriptionHandle {
        self.subscriptions.subscribe_default()
    }

    /// Register a subscriber with a custom config.
    pub fn subscribe_with(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        self.subscriptions.subscribe(config)
    }

    /// Take a snapshot of `[start, end]` and register a subscriber, with no
    /// insert in between.
    ///
    /// Every record is either in the snapshot or delivered to the handle,
    /// never both and never neither (barring queue overflow).
    pub fn subscribe_with_snapshot(
        &self,
        start: Timestamp,
        end: Timestamp,
        config: SubscriptionConfig,
    ) -> (Vec<LogRecord>, SubscriptionHandle) {
        let _lock = self.write_lock.lock();
        let snapshot = self.scan(start, end);
        let handle = self.subscriptions.subscribe(config);
        (snapshot, handle)
    }

    /// Unsubscribe and clean up. Idempotent.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id)
    }

    /// Whether a subscriber is still registered.
    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscriptions.contains(id)
    }

    /// Get the number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.subscription_count()
    }

    // --- Utility ---

    /// Get store statistics.
    pub fn stats(&self) -> StoreStats {
        let bounds = self.log.id_bounds();
        StoreStats {
            record_count: self.log.len() as u64,
            first_id: bounds.map(|(first, _)| first),
            last_id: bounds.map(|(_, last)| last),
            evicted_count: self.log.evicted_count(),
            subscription_count: self.subscriptions.subscription_count() as u64,
            broadcasts_delivered: self.dispatcher.delivered_count(),
            broadcasts_dropped: self.dispatcher.dropped_count(),
        }
    }

    /// Get the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}
