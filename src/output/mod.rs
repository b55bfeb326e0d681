//! Output module for crawl reports and summaries
//!
//! This module handles:
//! - The run report returned by the coordinator
//! - Statistics over the result store
//! - The markdown digest of stored results

mod markdown;
mod report;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use report::{print_report, CrawlReport, FailedItem, OutputError, OutputResult, SkipCounts};
pub use stats::{load_statistics, print_statistics, summarize, CrawlStatistics};

use crate::storage::{ResultStore, RunRecord};
use std::path::Path;

/// Writes the markdown digest of everything in `store`
///
/// # Arguments
///
/// * `store` - The result store to summarize
/// * `last_run` - Run shown in the digest header, if the store tracks runs
/// * `output_path` - Where to write the markdown file
pub fn export_summary(
    store: &dyn ResultStore,
    last_run: Option<RunRecord>,
    output_path: &Path,
) -> OutputResult<CrawlStatistics> {
    let records = store.all()?;
    let mut stats = summarize(&records);
    stats.last_run = last_run;
    generate_markdown_summary(&stats, &records, output_path)?;
    tracing::info!(
        "Wrote summary of {} record(s) to {}",
        records.len(),
        output_path.display()
    );
    Ok(stats)
}
