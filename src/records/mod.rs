//! Record log implementation.
//!
//! Records live in an insertion-ordered ring. Because ids and timestamps
//! are both assigned at append time, the ring is sorted by both and
//! time-range scans are two binary searches.

mod log;

pub use log::RecordLog;
