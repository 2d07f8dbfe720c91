pub mod readings;

pub use readings::PgReadingStore;

use crate::error::Result;
use crate::models::{NewReading, Reading};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    Inserted { id: i64 },
    /// The unique constraint on `external_id` rejected the row.
    AlreadyExists,
}

/// Append-only storage for readings.
///
/// `insert` must be atomic and must report a conflicting `external_id` as
/// [`InsertResult::AlreadyExists`] rather than an error, since the existence
/// check done before it can race with a concurrent insert.
///
/// `insert` bounds its own latency. Callers do not cancel it, so an `Err`
/// always means the row was not committed.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn find_by_external_id(&self, external_id: i64) -> Result<Option<Reading>>;

    async fn insert(&self, reading: &NewReading) -> Result<InsertResult>;

    async fn latest(&self) -> Result<Option<Reading>>;

    /// Readings with `start <= captured_at <= end`, oldest first.
    async fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Reading>>;

    async fn count(&self) -> Result<i64>;
}
