//! Crawler module for page fetching and crawl orchestration
//!
//! This module contains the core crawling logic, including:
//! - The per-domain rate limiter
//! - The crawl frontier (work queue, dedup set, request budget)
//! - HTTP fetching with retry and 429 handling
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod frontier;
mod rate_limiter;

pub use coordinator::{run_crawl, Coordinator};
pub use fetcher::{
    build_http_client, fetch_with_retry, is_html, parse_retry_after, FetchError, FetchOutcome,
    FetchedPage,
};
pub use frontier::{EnqueueOutcome, Frontier, Next, StopReason, WorkItem};
pub use rate_limiter::{DomainSlot, RateLimiter};

use crate::config::Config;
use crate::output::CrawlReport;
use crate::storage::ResultStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Validate the configuration
/// 2. Seed the frontier
/// 3. Fetch, extract and persist pages with `max-concurrency` workers
/// 4. Follow in-scope links up to `max-depth`
/// 5. Return the run report
///
/// The run stops early when `cancel` is triggered; in-flight items are
/// abandoned and reported as skipped.
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `store` - Destination for completed results
/// * `cancel` - External stop signal
pub async fn crawl(
    config: Config,
    store: Arc<dyn ResultStore>,
    cancel: CancellationToken,
) -> crate::Result<CrawlReport> {
    Coordinator::new(config, store)?
        .run_with_cancellation(cancel)
        .await
}
