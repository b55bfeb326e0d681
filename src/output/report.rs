//! Run report returned to whoever triggered a crawl

use crate::storage::{CrawlResult, RunStatus};
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// An item that ended in the failed state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub url: String,
    pub reason: String,
}

/// Skipped items by cause
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipCounts {
    /// Disallowed by robots.txt
    pub robots: u64,
    /// 2xx response that was not HTML
    pub non_html: u64,
    /// In flight when the run was cancelled
    pub cancelled: u64,
    /// Still queued when the run ended
    pub unprocessed: u64,
    /// Distinct discovered links rejected by the scope filter
    pub out_of_scope: u64,
}

impl SkipCounts {
    pub fn total(&self) -> u64 {
        self.robots + self.non_html + self.cancelled + self.unprocessed + self.out_of_scope
    }
}

/// Outcome of one crawl run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub completed: u64,
    pub failed: u64,
    pub skipped: SkipCounts,
    /// Whether the run stopped because it was cancelled
    pub cancelled: bool,
    /// Every record persisted during the run
    pub records: Vec<CrawlResult>,
    pub failures: Vec<FailedItem>,
}

impl CrawlReport {
    /// Total skipped items
    pub fn skipped_total(&self) -> u64 {
        self.skipped.total()
    }

    /// Wall-clock duration of the run
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Completed items as a percentage of items that reached a fetch outcome
    pub fn success_rate(&self) -> f64 {
        let attempted = self.completed + self.failed;
        if attempted == 0 {
            0.0
        } else {
            (self.completed as f64 / attempted as f64) * 100.0
        }
    }

    /// Status to record for the run
    pub fn run_status(&self) -> RunStatus {
        if self.cancelled {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        }
    }
}

/// Prints a run report to stdout
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");

    println!("Started:   {}", report.started_at.to_rfc3339());
    println!("Finished:  {}", report.finished_at.to_rfc3339());
    println!("Duration:  {:.1}s", report.duration().as_secs_f64());
    if report.cancelled {
        println!("Status:    cancelled");
    }
    println!();

    println!("Items:");
    println!("  Completed: {}", report.completed);
    println!("  Failed:    {}", report.failed);
    println!("  Skipped:   {}", report.skipped_total());
    println!("    robots.txt:    {}", report.skipped.robots);
    println!("    non-HTML:      {}", report.skipped.non_html);
    println!("    cancelled:     {}", report.skipped.cancelled);
    println!("    unprocessed:   {}", report.skipped.unprocessed);
    println!("    out of scope:  {}", report.skipped.out_of_scope);
    println!();

    if !report.failures.is_empty() {
        println!("Failures ({}):", report.failures.len());
        for failure in &report.failures {
            println!("  - {}: {}", failure.url, failure.reason);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} records persisted)",
        report.success_rate(),
        report.records.len()
    );
}
