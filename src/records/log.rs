//! Append-only in-memory record log.

use crate::types::{LogInput, LogRecord, RecordId, Timestamp};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

/// Records plus the id counter, guarded together.
struct LogInner {
    /// Records in insertion order (= id order = timestamp order).
    records: VecDeque<Arc<LogRecord>>,

    /// Next record ID to assign.
    next_id: RecordId,

    /// Timestamp of the most recently appended record.
    last_timestamp: Timestamp,

    /// Records removed by retention.
    evicted: u64,
}

/// Append-only record log with optional oldest-first retention.
///
/// Readers copy `Arc` handles out under the read lock, so eviction never
/// invalidates a snapshot that is already being returned.
pub struct RecordLog {
    inner: RwLock<LogInner>,

    /// Maximum retained records (None = unbounded).
    max_records: Option<usize>,
}

impl RecordLog {
    /// Create an unbounded log.
    pub fn new() -> Self {
        Self::with_retention(None)
    }

    /// Create a log that keeps at most `max_records` records.
    pub fn with_retention(max_records: Option<usize>) -> Self {
        Self {
            inner: RwLock::new(LogInner {
                records: VecDeque::new(),
                next_id: RecordId(1),
                last_timestamp: Timestamp::MIN,
                evicted: 0,
            }),
            max_records,
        }
    }

    /// Append a record, assigning its id and timestamp.
    ///
    /// Timestamps never go backwards even if the wall clock does.
    pub fn append(&self, input: LogInput) -> Arc<LogRecord> {
        let mut inner = self.inner.write();

        let id = inner.next_id;
        inner.next_id = id.next();

        let timestamp = Timestamp::now().max(inner.last_timestamp);
        inner.last_timestamp = timestamp;

        let record = Arc::new(LogRecord {
            id,
            status_code: input.status_code,
            message: input.message,
            timestamp,
        });
        inner.records.push_back(Arc::clone(&record));

        if let Some(max) = self.max_records {
            while inner.records.len() > max {
                inner.records.pop_front();
                inner.evicted += 1;
            }
        }

        record
    }

    /// All records with `start <= timestamp <= end`, ascending.
    pub fn scan(&self, start: Timestamp, end: Timestamp) -> Vec<Arc<LogRecord>> {
        if start > end {
            return Vec::new();
        }

        let inner = self.inner.read();
        let from = inner.records.partition_point(|r| r.timestamp < start);
        let to = inner.records.partition_point(|r| r.timestamp <= end);
        if from >= to {
            return Vec::new();
        }
        inner.records.range(from..to).cloned().collect()
    }

    /// Get a record by ID.
    pub fn get(&self, id: RecordId) -> Option<Arc<LogRecord>> {
        let inner = self.inner.read();
        let first = inner.records.front()?.id;
        if id < first {
            return None;
        }
        let pos = usize::try_from(id.0 - first.0).ok()?;
        inner.records.get(pos).cloned()
    }

    /// The most recent `count` records, ascending.
    pub fn latest(&self, count: usize) -> Vec<Arc<LogRecord>> {
        let inner = self.inner.read();
        let skip = inner.records.len().saturating_sub(count);
        inner.records.iter().skip(skip).cloned().collect()
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First and last retained ids.
    pub fn id_bounds(&self) -> Option<(RecordId, RecordId)> {
        let inner = self.inner.read();
        match (inner.records.front(), inner.records.back()) {
            (Some(first), Some(last)) => Some((first.id, last.id)),
            _ => None,
        }
    }

    /// Number of records removed by retention so far.
    pub fn evicted_count(&self) -> u64 {
        self.inner.read().evicted
    }

    /// Configured retention cap.
    pub fn max_records(&self) -> Option<usize> {
        self.max_records
    }
}

impl Default for RecordLog {
    fn default() -> Self {
        Self::new()
    }
}
