//! In-process result store, used for dry runs and tests

use crate::storage::traits::{ResultStore, StorageResult};
use crate::storage::CrawlResult;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Result store backed by a `Vec` behind a mutex
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<CrawlResult>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, Vec<CrawlResult>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResultStore for MemoryStore {
    fn push(&self, record: &CrawlResult) -> StorageResult<()> {
        self.records().push(record.clone());
        Ok(())
    }

    fn get_by_url(&self, url: &str) -> StorageResult<Vec<CrawlResult>> {
        let mut matching: Vec<CrawlResult> = self
            .records()
            .iter()
            .filter(|r| r.url == url)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.metadata.crawled_at);
        Ok(matching)
    }

    fn crawled_since(&self, since: DateTime<Utc>) -> StorageResult<Vec<CrawlResult>> {
        let mut matching: Vec<CrawlResult> = self
            .records()
            .iter()
            .filter(|r| r.metadata.crawled_at >= since)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.metadata.crawled_at);
        Ok(matching)
    }

    fn all(&self) -> StorageResult<Vec<CrawlResult>> {
        Ok(self.records().clone())
    }

    fn count(&self) -> StorageResult<usize> {
        Ok(self.records().len())
    }
}
