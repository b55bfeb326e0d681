//! Markdown digest of stored crawl results
//!
//! The digest lists the crawled pages with their titles and entity counts,
//! then the distinct award, category, date and price mentions found across
//! the crawl.

use crate::extract::{normalize_text, EntityKind};
use crate::output::stats::CrawlStatistics;
use crate::output::OutputResult;
use crate::storage::CrawlResult;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Longest title shown in the pages table
const MAX_TITLE_CHARS: usize = 80;

/// Writes the markdown digest to `output_path`
///
/// # Arguments
///
/// * `stats` - Statistics over `records`
/// * `records` - Stored crawl results
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the digest
/// * `Err(OutputError)` - Failed to write it
pub fn generate_markdown_summary(
    stats: &CrawlStatistics,
    records: &[CrawlResult],
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_markdown_summary(stats, records);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats the digest as markdown
///
/// Pages appear once each, using their most recent record.
pub fn format_markdown_summary(stats: &CrawlStatistics, records: &[CrawlResult]) -> String {
    let mut md = String::new();

    md.push_str("# Stevie Crawl Summary\n\n");

    if let Some(run) = &stats.last_run {
        md.push_str("## Last Run\n\n");
        md.push_str(&format!("- **Run ID**: {}\n", run.id));
        md.push_str(&format!("- **Started**: {}\n", run.started_at));
        if let Some(finished) = &run.finished_at {
            md.push_str(&format!("- **Finished**: {}\n", finished));
        }
        md.push_str(&format!("- **Status**: {}\n", run.status.to_db_string()));
        md.push_str(&format!(
            "- **Completed / Failed / Skipped**: {} / {} / {}\n",
            run.completed, run.failed, run.skipped
        ));
        md.push_str(&format!("- **Config Hash**: {}\n\n", run.config_hash));
    }

    md.push_str("## Overview\n\n");
    md.push_str(&format!("- **Stored Records**: {}\n", stats.total_records));
    md.push_str(&format!("- **Unique URLs**: {}\n", stats.unique_urls));
    md.push_str(&format!("- **Tables**: {}\n", stats.total_tables));
    for (kind, count) in &stats.entities_by_type {
        md.push_str(&format!("- **{} entities**: {}\n", capitalize(kind), count));
    }
    md.push('\n');

    if !stats.depth_breakdown.is_empty() {
        md.push_str("## Depth Breakdown\n\n");
        md.push_str("| Depth | Records |\n");
        md.push_str("|-------|---------|\n");
        for (depth, count) in &stats.depth_breakdown {
            md.push_str(&format!("| {} | {} |\n", depth, count));
        }
        md.push('\n');
    }

    let latest = latest_per_url(records);

    if !latest.is_empty() {
        md.push_str("## Pages\n\n");
        md.push_str("| URL | Title | Depth | Entities | Tables |\n");
        md.push_str("|-----|-------|-------|----------|--------|\n");
        for record in latest.values() {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                record.url,
                table_cell(&record.title),
                record.metadata.depth,
                record.entities.len(),
                record.tables.len()
            ));
        }
        md.push('\n');
    }

    for (kind, heading) in [
        (EntityKind::Award, "Awards"),
        (EntityKind::Category, "Categories"),
        (EntityKind::Date, "Dates"),
        (EntityKind::Price, "Prices"),
    ] {
        let values: BTreeSet<String> = latest
            .values()
            .flat_map(|r| r.entities.iter())
            .filter(|e| e.kind == kind)
            .map(|e| normalize_text(&e.value))
            .filter(|v| !v.is_empty())
            .collect();

        if values.is_empty() {
            continue;
        }

        md.push_str(&format!("## {} Mentioned\n\n", heading));
        for value in values {
            md.push_str(&format!("- {}\n", value));
        }
        md.push('\n');
    }

    md
}

fn latest_per_url(records: &[CrawlResult]) -> BTreeMap<&str, &CrawlResult> {
    let mut latest: BTreeMap<&str, &CrawlResult> = BTreeMap::new();
    for record in records {
        latest
            .entry(record.url.as_str())
            .and_modify(|current| {
                if record.metadata.crawled_at > current.metadata.crawled_at {
                    *current = record;
                }
            })
            .or_insert(record);
    }
    latest
}

fn table_cell(text: &str) -> String {
    let text = normalize_text(text).replace('|', "\\|");
    if text.chars().count() > MAX_TITLE_CHARS {
        let truncated: String = text.chars().take(MAX_TITLE_CHARS).collect();
        format!("{}...", truncated)
    } else if text.is_empty() {
        "-".to_string()
    } else {
        text
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
