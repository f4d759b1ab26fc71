//! Time-range queries over the store.
//!
//! The gateway resolves optional bounds to concrete instants, rejects
//! malformed dates before the store is touched, and returns a
//! point-in-time snapshot.

use crate::error::Result;
use crate::store::Store;
use crate::types::{LogRecord, Timestamp};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 24 hours.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Query gateway configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// How far back an omitted start date reaches, in seconds.
    pub default_window_secs: u64,
}

impl QueryConfig {
    pub fn default_window(&self) -> Duration {
        Duration::from_secs(self.default_window_secs)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_window_secs: DEFAULT_WINDOW.as_secs(),
        }
    }
}

/// Raw query parameters as they arrive from an HTTP handler
/// (`?startDate=...&endDate=...`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl LogQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_date(mut self, date: impl Into<String>) -> Self {
        self.start_date = Some(date.into());
        self
    }

    pub fn end_date(mut self, date: impl Into<String>) -> Self {
        self.end_date = Some(date.into());
        self
    }

    /// Parse both bounds. Empty strings count as omitted.
    pub fn parse(&self) -> Result<(Option<Timestamp>, Option<Timestamp>)> {
        Ok((
            parse_bound(self.start_date.as_deref())?,
            parse_bound(self.end_date.as_deref())?,
        ))
    }
}

fn parse_bound(raw: Option<&str>) -> Result<Option<Timestamp>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => Timestamp::parse(s).map(Some),
    }
}

/// Answers time-range queries against a shared store.
#[derive(Clone)]
pub struct QueryGateway {
    store: Arc<Store>,
    config: QueryConfig,
}

impl QueryGateway {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_config(store, QueryConfig::default())
    }

    pub fn with_config(store: Arc<Store>, config: QueryConfig) -> Self {
        Self { store, config }
    }

    /// Records between `start` and `end` inclusive.
    ///
    /// `start` defaults to one window before now, `end` to now. An
    /// inverted range is not an error; it simply matches nothing.
    pub fn get_logs(
        &self,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<Vec<LogRecord>> {
        let now = Timestamp::now();
        let start = start.unwrap_or_else(|| now.saturating_sub(self.config.default_window()));
        let end = end.unwrap_or(now);

        let logs = self.store.scan(start, end);
        debug!(%start, %end, count = logs.len(), "logs queried");
        Ok(logs)
    }

    /// Same as `get_logs`, from raw query-string dates.
    pub fn get_logs_from_query(&self, query: &LogQuery) -> Result<Vec<LogRecord>> {
        let (start, end) = query.parse()?;
        self.get_logs(start, end)
    }

    /// Render a result as the JSON array an HTTP handler returns.
    pub fn to_json(logs: &[LogRecord]) -> Result<String> {
        Ok(serde_json::to_string(logs)?)
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }
}
