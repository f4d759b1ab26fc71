//! Core types for the log store.

use crate::error::{Result, StoreError};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Unique identifier for a record.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    pub fn next(self) -> Self {
        RecordId(self.0 + 1)
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Microseconds since Unix epoch.
///
/// Serialized as an RFC 3339 UTC string (`2024-05-01T12:00:00.123456Z`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Earliest representable instant, usable as an open lower bound.
    pub const MIN: Timestamp = Timestamp(i64::MIN);

    /// Latest representable instant, usable as an open upper bound.
    pub const MAX: Timestamp = Timestamp(i64::MAX);

    /// Current time.
    pub fn now() -> Self {
        Timestamp(Utc::now().timestamp_micros())
    }

    /// This instant moved `duration` into the past, saturating at `MIN`.
    pub fn saturating_sub(self, duration: Duration) -> Self {
        let micros = i64::try_from(duration.as_micros()).unwrap_or(i64::MAX);
        Timestamp(self.0.saturating_sub(micros))
    }

    /// This instant moved `duration` into the future, saturating at `MAX`.
    pub fn saturating_add(self, duration: Duration) -> Self {
        let micros = i64::try_from(duration.as_micros()).unwrap_or(i64::MAX);
        Timestamp(self.0.saturating_add(micros))
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Timestamp(dt.timestamp_micros())
    }

    /// Convert to a chrono datetime. `None` outside chrono's supported range.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_micros(self.0)
    }

    /// Parse an RFC 3339 instant or a bare `YYYY-MM-DD` date (UTC midnight).
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Timestamp(dt.timestamp_micros()));
        }

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                return Ok(Timestamp(midnight.and_utc().timestamp_micros()));
            }
        }

        Err(StoreError::InvalidRange(format!("unrecognised date: {:?}", s)))
    }

    /// RFC 3339 rendering with microsecond precision.
    pub fn to_rfc3339(self) -> Option<String> {
        self.to_datetime()
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Some(s) => f.write_str(&s),
            None => write!(f, "{}us", self.0),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.to_rfc3339() {
            Some(s) => serializer.serialize_str(&s),
            None => Err(serde::ser::Error::custom(format!(
                "timestamp out of range: {}",
                self.0
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Timestamp::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A single stored HTTP log entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// Unique identifier (assigned by store).
    pub id: RecordId,

    /// HTTP status code.
    pub status_code: u16,

    /// Human-readable message.
    pub message: String,

    /// When the record was stored (assigned by store).
    pub timestamp: Timestamp,
}

/// Input for creating a new record (before id/timestamp assigned).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogInput {
    pub status_code: u16,
    pub message: String,
}

impl LogInput {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }

    /// Reject inputs the store must never persist.
    pub fn validate(&self) -> Result<()> {
        if self.status_code == 0 {
            return Err(StoreError::InvalidInput(
                "status code must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

/// Canned entries used to seed a fresh store.
pub const SAMPLE_LOGS: [(u16, &str); 10] = [
    (500, "Internal Server Error"),
    (404, "Not Found"),
    (403, "Forbidden"),
    (401, "Unauthorized"),
    (400, "Bad Request"),
    (200, "OK"),
    (201, "Created"),
    (503, "Service Unavailable"),
    (502, "Bad Gateway"),
    (429, "Too Many Requests"),
];

/// Store statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub record_count: u64,
    pub first_id: Option<RecordId>,
    pub last_id: Option<RecordId>,
    pub evicted_count: u64,
    pub subscription_count: u64,
    pub broadcasts_delivered: u64,
    pub broadcasts_dropped: u64,
}
