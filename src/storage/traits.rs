//! Storage traits and error types

use crate::storage::CrawlResult;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Append-only sink for crawl records, with a read side for collaborators
///
/// Implementations are shared by all crawl workers, so every method takes
/// `&self` and one `push` must be atomic with respect to concurrent pushes.
/// There is no update or delete.
pub trait ResultStore: Send + Sync {
    /// Appends one record
    fn push(&self, record: &CrawlResult) -> StorageResult<()>;

    /// All records for an exact URL, oldest first
    fn get_by_url(&self, url: &str) -> StorageResult<Vec<CrawlResult>>;

    /// The most recently crawled record for an exact URL
    fn latest_by_url(&self, url: &str) -> StorageResult<Option<CrawlResult>> {
        Ok(self
            .get_by_url(url)?
            .into_iter()
            .max_by_key(|r| r.metadata.crawled_at))
    }

    /// Records crawled at or after `since`, oldest first
    fn crawled_since(&self, since: DateTime<Utc>) -> StorageResult<Vec<CrawlResult>>;

    /// Every record in insertion order
    fn all(&self) -> StorageResult<Vec<CrawlResult>>;

    /// Number of records
    fn count(&self) -> StorageResult<usize>;
}
