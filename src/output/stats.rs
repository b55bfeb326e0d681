//! Statistics over the result store
//!
//! This module provides functionality for summarizing persisted crawl
//! results and displaying them.

use crate::extract::EntityKind;
use crate::output::OutputResult;
use crate::storage::{CrawlResult, ResultStore, RunRecord};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

/// Result store statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Total number of stored records (a URL crawled twice counts twice)
    pub total_records: u64,

    /// Number of distinct URLs with at least one record
    pub unique_urls: u64,

    /// Number of distinct hosts among stored URLs
    pub unique_domains: u64,

    /// Entity counts keyed by entity type name
    pub entities_by_type: BTreeMap<&'static str, u64>,

    /// Records per crawl depth
    pub depth_breakdown: BTreeMap<u32, u64>,

    /// Total extracted tables
    pub total_tables: u64,

    /// Earliest and latest `crawled_at`
    pub first_crawled_at: Option<DateTime<Utc>>,
    pub last_crawled_at: Option<DateTime<Utc>>,

    /// Most recent run, when the store tracks runs
    pub last_run: Option<RunRecord>,
}

/// Loads statistics from a result store
///
/// # Arguments
///
/// * `store` - The store to summarize
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully computed statistics
/// * `Err(OutputError)` - Failed to read the store
pub fn load_statistics(store: &dyn ResultStore) -> OutputResult<CrawlStatistics> {
    let records = store.all()?;
    Ok(summarize(&records))
}

/// Computes statistics over a set of records
pub fn summarize(records: &[CrawlResult]) -> CrawlStatistics {
    let mut stats = CrawlStatistics {
        total_records: records.len() as u64,
        ..CrawlStatistics::default()
    };

    for kind in [
        EntityKind::Award,
        EntityKind::Category,
        EntityKind::Date,
        EntityKind::Price,
    ] {
        stats.entities_by_type.insert(kind.as_str(), 0);
    }

    let mut urls = HashSet::new();
    let mut domains = HashSet::new();

    for record in records {
        if urls.insert(record.url.as_str()) {
            if let Some(host) = url::Url::parse(&record.url)
                .ok()
                .and_then(|u| crate::url::extract_domain(&u))
            {
                domains.insert(host);
            }
        }

        for entity in &record.entities {
            *stats.entities_by_type.entry(entity.kind.as_str()).or_insert(0) += 1;
        }
        *stats
            .depth_breakdown
            .entry(record.metadata.depth)
            .or_insert(0) += 1;
        stats.total_tables += record.tables.len() as u64;

        let at = record.metadata.crawled_at;
        stats.first_crawled_at = Some(stats.first_crawled_at.map_or(at, |t| t.min(at)));
        stats.last_crawled_at = Some(stats.last_crawled_at.map_or(at, |t| t.max(at)));
    }

    stats.unique_urls = urls.len() as u64;
    stats.unique_domains = domains.len() as u64;
    stats
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Stored records: {}", stats.total_records);
    println!("  Unique URLs: {}", stats.unique_urls);
    println!("  Unique domains: {}", stats.unique_domains);
    println!("  Tables extracted: {}", stats.total_tables);
    if let (Some(first), Some(last)) = (stats.first_crawled_at, stats.last_crawled_at) {
        println!("  Crawled between: {} and {}", first.to_rfc3339(), last.to_rfc3339());
    }
    println!();

    println!("Entities by Type:");
    let mut entity_counts: Vec<_> = stats.entities_by_type.iter().collect();
    entity_counts.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    for (kind, count) in entity_counts {
        println!("  {}: {}", kind, count);
    }
    println!();

    if !stats.depth_breakdown.is_empty() {
        println!("Records by Depth:");
        for (depth, count) in &stats.depth_breakdown {
            let percentage = if stats.total_records > 0 {
                (*count as f64 / stats.total_records as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", depth, count, percentage);
        }
        println!();
    }

    if let Some(run) = &stats.last_run {
        println!("Last Run (#{}):", run.id);
        println!("  Status: {}", run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!(
            "  Completed / Failed / Skipped: {} / {} / {}",
            run.completed, run.failed, run.skipped
        );
        println!("  Config hash: {}", run.config_hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractedEntity, TableData};
    use crate::storage::{CrawlMetadata, MemoryStore};
    use chrono::Duration;

    fn record(url: &str, depth: u32, kinds: &[EntityKind], at: DateTime<Utc>) -> CrawlResult {
        CrawlResult {
            url: url.to_string(),
            title: String::new(),
            content: String::new(),
            headings: Vec::new(),
            tables: vec![TableData::default()],
            entities: kinds
                .iter()
                .map(|kind| ExtractedEntity {
                    kind: *kind,
                    value: "x".to_string(),
                    context: "x".to_string(),
                })
                .collect(),
            metadata: CrawlMetadata {
                crawled_at: at,
                content_type: "text/html".to_string(),
                depth,
            },
        }
    }

    #[test]
    fn test_summarize_counts() {
        let now = Utc::now();
        let records = vec![
            record(
                "https://www.stevieawards.com/",
                0,
                &[EntityKind::Award, EntityKind::Date],
                now - Duration::hours(1),
            ),
            record(
                "https://www.stevieawards.com/women",
                1,
                &[EntityKind::Award, EntityKind::Price],
                now,
            ),
            record("https://www.stevieawards.com/", 0, &[], now),
            record("https://help.stevieawards.com/", 1, &[], now),
        ];

        let stats = summarize(&records);
        assert_eq!(stats.total_records, 4);
        assert_eq!(stats.unique_urls, 3);
        assert_eq!(stats.unique_domains, 2);
        assert_eq!(stats.total_tables, 4);
        assert_eq!(stats.entities_by_type["award"], 2);
        assert_eq!(stats.entities_by_type["category"], 0);
        assert_eq!(stats.depth_breakdown[&0], 2);
        assert_eq!(stats.depth_breakdown[&1], 2);
        assert_eq!(stats.first_crawled_at, Some(now - Duration::hours(1)));
        assert_eq!(stats.last_crawled_at, Some(now));
    }

    #[test]
    fn test_load_statistics_from_empty_store() {
        let stats = load_statistics(&MemoryStore::new()).unwrap();
        assert_eq!(stats.total_records, 0);
        assert!(stats.last_crawled_at.is_none());
        assert_eq!(stats.entities_by_type.len(), 4);
    }
}
