//! SQLite storage implementation
//!
//! This module provides a SQLite-backed `ResultStore` plus run tracking.

use crate::extract::{ExtractedEntity, TableData};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ResultStore, StorageError, StorageResult};
use crate::storage::{CrawlMetadata, CrawlResult, RunRecord, RunStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const RESULT_COLUMNS: &str = "url, title, content, headings_json, tables_json, entities_json, \
                              crawled_at, content_type, depth";

/// SQLite result store
///
/// A single connection behind a mutex: each `push` is one INSERT executed
/// while holding the lock, so concurrent workers never interleave writes.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database or create the schema
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== Run Management =====

    /// Records the start of a run and returns its ID
    pub fn create_run(&self, config_hash: &str) -> StorageResult<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![
                Utc::now().to_rfc3339(),
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Stamps the finish time, final status and outcome counts of a run
    pub fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        completed: u64,
        failed: u64,
        skipped: u64,
    ) -> StorageResult<()> {
        let updated = self.conn().execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, completed = ?3, failed = ?4, skipped = ?5
             WHERE id = ?6",
            params![
                status.to_db_string(),
                Utc::now().to_rfc3339(),
                completed as i64,
                failed as i64,
                skipped as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    /// Gets a run by ID
    pub fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn()
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status, completed, failed, skipped
                 FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    /// Gets the most recent run
    pub fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn()
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status, completed, failed, skipped
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn query_results(
        &self,
        filter: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> StorageResult<Vec<CrawlResult>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {} FROM crawl_results {} ORDER BY crawled_at, id",
            RESULT_COLUMNS, filter
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt
            .query_map(args, StoredRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(StoredRow::into_result).collect()
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
        completed: row.get::<_, i64>(5)? as u64,
        failed: row.get::<_, i64>(6)? as u64,
        skipped: row.get::<_, i64>(7)? as u64,
    })
}

/// Column values as stored, before JSON and timestamp decoding
struct StoredRow {
    url: String,
    title: String,
    content: String,
    headings_json: String,
    tables_json: String,
    entities_json: String,
    crawled_at: String,
    content_type: String,
    depth: i64,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            url: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            headings_json: row.get(3)?,
            tables_json: row.get(4)?,
            entities_json: row.get(5)?,
            crawled_at: row.get(6)?,
            content_type: row.get(7)?,
            depth: row.get(8)?,
        })
    }

    fn into_result(self) -> StorageResult<CrawlResult> {
        let headings: Vec<String> = decode_json(&self.headings_json)?;
        let tables: Vec<TableData> = decode_json(&self.tables_json)?;
        let entities: Vec<ExtractedEntity> = decode_json(&self.entities_json)?;
        let crawled_at = DateTime::parse_from_rfc3339(&self.crawled_at)
            .map_err(|e| {
                StorageError::Serialization(format!("bad timestamp '{}': {}", self.crawled_at, e))
            })?
            .with_timezone(&Utc);

        Ok(CrawlResult {
            url: self.url,
            title: self.title,
            content: self.content,
            headings,
            tables,
            entities,
            metadata: CrawlMetadata {
                crawled_at,
                content_type: self.content_type,
                depth: self.depth.max(0) as u32,
            },
        })
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(raw: &str) -> StorageResult<T> {
    serde_json::from_str(raw).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn encode_json<T: serde::Serialize>(value: &T) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Fixed-width UTC timestamps so string order matches time order
fn timestamp_key(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl ResultStore for SqliteStore {
    fn push(&self, record: &CrawlResult) -> StorageResult<()> {
        let headings = encode_json(&record.headings)?;
        let tables = encode_json(&record.tables)?;
        let entities = encode_json(&record.entities)?;

        self.conn().execute(
            &format!(
                "INSERT INTO crawl_results ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                RESULT_COLUMNS
            ),
            params![
                record.url,
                record.title,
                record.content,
                headings,
                tables,
                entities,
                timestamp_key(&record.metadata.crawled_at),
                record.metadata.content_type,
                record.metadata.depth as i64
            ],
        )?;
        Ok(())
    }

    fn get_by_url(&self, url: &str) -> StorageResult<Vec<CrawlResult>> {
        self.query_results("WHERE url = ?1", &[&url])
    }

    fn crawled_since(&self, since: DateTime<Utc>) -> StorageResult<Vec<CrawlResult>> {
        let key = timestamp_key(&since);
        self.query_results("WHERE crawled_at >= ?1", &[&key])
    }

    fn all(&self) -> StorageResult<Vec<CrawlResult>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM crawl_results ORDER BY id",
            RESULT_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], StoredRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(StoredRow::into_result).collect()
    }

    fn count(&self) -> StorageResult<usize> {
        let count: i64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM crawl_results", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::EntityKind;
    use chrono::Duration;
    use std::sync::Arc;

    fn create_test_record(url: &str, crawled_at: DateTime<Utc>) -> CrawlResult {
        CrawlResult {
            url: url.to_string(),
            title: "The American Business Awards".to_string(),
            content: "Entries open March 1, 2024.".to_string(),
            headings: vec!["Categories".to_string(), "Fees".to_string()],
            tables: vec![TableData {
                headers: vec!["Category".to_string(), "Fee".to_string()],
                rows: vec![vec!["Startup".to_string(), "$495".to_string()]],
            }],
            entities: vec![ExtractedEntity {
                kind: EntityKind::Date,
                value: "March 1, 2024".to_string(),
                context: "Entries open March 1, 2024.".to_string(),
            }],
            metadata: CrawlMetadata {
                crawled_at,
                content_type: "text/html; charset=utf-8".to_string(),
                depth: 1,
            },
        }
    }

    #[test]
    fn test_push_and_read_back() {
        let store = SqliteStore::new_in_memory().unwrap();
        let record = create_test_record("https://www.stevieawards.com/aba", Utc::now());

        store.push(&record).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let loaded = store.get_by_url("https://www.stevieawards.com/aba").unwrap();
        assert_eq!(loaded.len(), 1);
        // Sub-microsecond precision is not stored
        assert_eq!(loaded[0].tables, record.tables);
        assert_eq!(loaded[0].entities, record.entities);
        assert_eq!(loaded[0].headings, record.headings);
        assert_eq!(loaded[0].metadata.depth, 1);
    }

    #[test]
    fn test_url_identity_is_exact() {
        let store = SqliteStore::new_in_memory().unwrap();
        store
            .push(&create_test_record("https://example.com/a", Utc::now()))
            .unwrap();

        assert!(store.get_by_url("https://example.com/a/").unwrap().is_empty());
        assert!(store.latest_by_url("https://example.com/a?x=1").unwrap().is_none());
    }

    #[test]
    fn test_latest_by_url_and_crawled_since() {
        let store = SqliteStore::new_in_memory().unwrap();
        let now = Utc::now();
        let old = now - Duration::days(3);

        let mut first = create_test_record("https://example.com/winners", old);
        first.title = "Old".to_string();
        let mut second = create_test_record("https://example.com/winners", now);
        second.title = "New".to_string();
        let other = create_test_record("https://example.com/other", now - Duration::hours(1));

        store.push(&second).unwrap();
        store.push(&first).unwrap();
        store.push(&other).unwrap();

        let latest = store
            .latest_by_url("https://example.com/winners")
            .unwrap()
            .unwrap();
        assert_eq!(latest.title, "New");

        let recent = store.crawled_since(now - Duration::days(1)).unwrap();
        let urls: Vec<&str> = recent.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://example.com/other", "https://example.com/winners"]
        );

        // Insertion order for all()
        let all = store.all().unwrap();
        assert_eq!(all[0].title, "New");
        assert_eq!(all[1].title, "Old");
    }

    #[test]
    fn test_concurrent_pushes() {
        let store = Arc::new(SqliteStore::new_in_memory().unwrap());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..10 {
                        let url = format!("https://example.com/{}/{}", i, j);
                        store.push(&create_test_record(&url, Utc::now())).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.count().unwrap(), 80);
    }

    #[test]
    fn test_run_lifecycle() {
        let store = SqliteStore::new_in_memory().unwrap();
        assert!(store.latest_run().unwrap().is_none());

        let run_id = store.create_run("abc123").unwrap();
        let run = store.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.finished_at.is_none());

        store
            .finish_run(run_id, RunStatus::Completed, 5, 1, 2)
            .unwrap();
        let run = store.latest_run().unwrap().unwrap();
        assert_eq!(run.id, run_id);
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!((run.completed, run.failed, run.skipped), (5, 1, 2));
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_finish_unknown_run() {
        let store = SqliteStore::new_in_memory().unwrap();
        assert!(matches!(
            store.finish_run(42, RunStatus::Completed, 0, 0, 0),
            Err(StorageError::RunNotFound(42))
        ));
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawl.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .push(&create_test_record("https://example.com/", Utc::now()))
                .unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
