//! Storage module for persisting crawl results
//!
//! This module handles:
//! - The `CrawlResult` record produced for every successfully processed URL
//! - The append-only `ResultStore` interface and its read side for collaborators
//! - SQLite and in-memory implementations
//! - Run tracking (start/finish, config hash, outcome counts)

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{ResultStore, StorageError, StorageResult};

use crate::extract::{ExtractedEntity, TableData};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Opens (or creates) the SQLite result store at `path`
pub fn open_storage(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::open(path)
}

/// Structured record for one successfully processed URL
///
/// Built once, never modified, written to the store exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlResult {
    pub url: String,
    pub title: String,
    pub content: String,
    pub headings: Vec<String>,
    pub tables: Vec<TableData>,
    pub entities: Vec<ExtractedEntity>,
    pub metadata: CrawlMetadata,
}

/// Provenance of a [`CrawlResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlMetadata {
    pub crawled_at: DateTime<Utc>,
    pub content_type: String,
    pub depth: u32,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
