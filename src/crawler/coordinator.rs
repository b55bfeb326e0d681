//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties the other pieces together:
//! - Seeding the frontier and spawning `max-concurrency` workers
//! - robots.txt checks, rate-limiter slots and fetch-with-retry per item
//! - Content and entity extraction, persistence, link enqueueing
//! - Cooperative cancellation and the final run report
//!
//! Per-item failures are logged and counted; they never end the run.

use crate::config::{validate, Config};
use crate::crawler::fetcher::{build_http_client, fetch_with_retry, FetchOutcome, FetchedPage};
use crate::crawler::frontier::{Frontier, Next, WorkItem};
use crate::crawler::RateLimiter;
use crate::extract::{extract_content, extract_entities, Document};
use crate::output::{CrawlReport, FailedItem, SkipCounts};
use crate::robots::RobotsCache;
use crate::state::ItemState;
use crate::storage::{CrawlMetadata, CrawlResult, ResultStore};
use crate::url::{extract_domain, parse_http_url, LinkFilter};
use crate::Result;
use chrono::Utc;
use reqwest::Client;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// How often (in completed items) progress is logged
const PROGRESS_EVERY: u64 = 10;

/// Why an item ended up skipped
#[derive(Debug, Clone, PartialEq, Eq)]
enum SkipReason {
    Robots,
    NotHtml(String),
    Cancelled,
}

/// Terminal outcome of one work item
#[derive(Debug)]
enum ItemOutcome {
    Completed {
        record: CrawlResult,
        links: Vec<Url>,
    },
    Failed(String),
    Skipped(SkipReason),
}

impl ItemOutcome {
    fn state(&self) -> ItemState {
        match self {
            Self::Completed { .. } => ItemState::Completed,
            Self::Failed(_) => ItemState::Failed,
            Self::Skipped(_) => ItemState::Skipped,
        }
    }
}

/// Counters and collected output for a run
#[derive(Debug, Default)]
struct Tally {
    completed: u64,
    failed: u64,
    skipped: SkipCounts,
    records: Vec<CrawlResult>,
    failures: Vec<FailedItem>,
}

/// Everything the workers share
struct RunContext {
    config: Config,
    client: Client,
    store: Arc<dyn ResultStore>,
    limiter: RateLimiter,
    robots: RobotsCache,
    frontier: Frontier,
    cancel: CancellationToken,
    tally: Mutex<Tally>,
}

/// Main crawler coordinator structure
///
/// Built from a validated configuration and a result store; consumed by
/// [`run`](Self::run).
pub struct Coordinator {
    context: Arc<RunContext>,
    seeds: Vec<Url>,
}

impl Coordinator {
    /// Creates a coordinator for one crawl run
    ///
    /// The configuration is validated here, so a bad config fails before
    /// any request is made.
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `store` - Where completed results are appended
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(CrawlerError)` - Invalid configuration or HTTP client setup failure
    pub fn new(config: Config, store: Arc<dyn ResultStore>) -> Result<Self> {
        validate(&config)?;

        let seeds = config
            .seeds
            .iter()
            .map(|s| parse_http_url(s).map(|(url, _)| url))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let filter = LinkFilter::from_config(&config)?;
        let client = build_http_client(&config.crawler.user_agent, config.fetch.timeout())?;
        let limiter = RateLimiter::new(config.rate_limit.clone());
        let frontier = Frontier::new(config.crawler.max_requests_per_crawl, filter);

        Ok(Self {
            context: Arc::new(RunContext {
                config,
                client,
                store,
                limiter,
                robots: RobotsCache::new(),
                frontier,
                cancel: CancellationToken::new(),
                tally: Mutex::new(Tally::default()),
            }),
            seeds,
        })
    }

    /// Token that cancels this run when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.context.cancel.clone()
    }

    /// Runs the crawl to completion
    ///
    /// Returns once the frontier is exhausted, the request budget is spent,
    /// or the run is cancelled through [`cancellation_token`](Self::cancellation_token).
    pub async fn run(self) -> Result<CrawlReport> {
        let started_at = Utc::now();
        let config = &self.context.config;

        let seeded = self.context.frontier.seed(self.seeds.iter().cloned());
        tracing::info!(
            "Starting crawl: {} seed(s), budget {}, depth {}, {} worker(s)",
            seeded,
            config.crawler.max_requests_per_crawl,
            config.crawler.max_depth,
            config.crawler.max_concurrency
        );

        let mut workers = JoinSet::new();
        for id in 0..config.crawler.max_concurrency {
            let context = Arc::clone(&self.context);
            workers.spawn(async move { worker(context, id).await });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Crawl worker terminated abnormally: {}", e);
            }
        }

        let report = self.build_report(started_at);

        tracing::info!(
            "Crawl finished in {:.1}s: {} completed, {} failed, {} skipped",
            report.duration().as_secs_f64(),
            report.completed,
            report.failed,
            report.skipped_total()
        );

        Ok(report)
    }

    /// Runs the crawl, cancelling it when `cancel` is triggered
    pub async fn run_with_cancellation(self, cancel: CancellationToken) -> Result<CrawlReport> {
        let own = self.cancellation_token();
        let bridge = tokio::spawn(async move {
            cancel.cancelled().await;
            own.cancel();
        });

        let report = self.run().await;
        bridge.abort();
        report
    }

    fn build_report(&self, started_at: chrono::DateTime<Utc>) -> CrawlReport {
        let context = &self.context;
        let mut tally = std::mem::take(
            &mut *context
                .tally
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        tally.skipped.unprocessed = context.frontier.queued() as u64;
        tally.skipped.out_of_scope = context.frontier.rejected() as u64;

        CrawlReport {
            started_at,
            finished_at: Utc::now(),
            completed: tally.completed,
            failed: tally.failed,
            skipped: tally.skipped,
            cancelled: context.cancel.is_cancelled(),
            records: tally.records,
            failures: tally.failures,
        }
    }
}

/// Pulls items from the frontier until it stops
async fn worker(context: Arc<RunContext>, id: u32) {
    let courtesy_delay = context.config.crawler.request_delay();

    loop {
        let item = match context.frontier.next(&context.cancel).await {
            Next::Item(item) => item,
            Next::Stop(reason) => {
                tracing::debug!("Worker {} stopping: {:?}", id, reason);
                break;
            }
        };

        tracing::debug!(
            "Worker {}: {} (depth {}) {} -> {}",
            id,
            item.url,
            item.depth,
            ItemState::Queued,
            ItemState::InFlight
        );

        let outcome = process_item(&context, &item).await;
        let completed = matches!(outcome, ItemOutcome::Completed { .. });

        // Links are only collected below the depth ceiling
        let links = record_outcome(&context, &item, outcome);
        let child_depth = item.depth + 1;
        let enqueued = context.frontier.finish(&links, child_depth);

        if enqueued.enqueued > 0 || enqueued.rejected > 0 {
            tracing::debug!(
                "{}: {} link(s) enqueued at depth {}, {} duplicate(s), {} out of scope",
                item.url,
                enqueued.enqueued,
                child_depth,
                enqueued.duplicates,
                enqueued.rejected
            );
        }

        if completed && !courtesy_delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(courtesy_delay) => {}
                _ = context.cancel.cancelled() => {}
            }
        }
    }
}

/// Takes one item from in-flight to a terminal outcome
///
/// Nothing here holds the parsed document across an await.
async fn process_item(context: &RunContext, item: &WorkItem) -> ItemOutcome {
    let config = &context.config;
    let cancel = &context.cancel;

    let Some(domain) = extract_domain(&item.url) else {
        return ItemOutcome::Failed("URL has no host".to_string());
    };

    if config.crawler.respect_robots_txt {
        let allowed = tokio::select! {
            allowed = context.robots.is_allowed(&context.client, &context.limiter, &item.url, &config.crawler.user_agent) => allowed,
            _ = cancel.cancelled() => return ItemOutcome::Skipped(SkipReason::Cancelled),
        };
        if !allowed {
            return ItemOutcome::Skipped(SkipReason::Robots);
        }
    }

    let fetched = {
        let slot = tokio::select! {
            slot = context.limiter.slot(&domain) => slot,
            _ = cancel.cancelled() => return ItemOutcome::Skipped(SkipReason::Cancelled),
        };

        let fetched = tokio::select! {
            fetched = fetch_with_retry(&context.client, &item.url, &domain, &context.limiter, &config.fetch) => fetched,
            _ = cancel.cancelled() => return ItemOutcome::Skipped(SkipReason::Cancelled),
        };

        drop(slot);
        fetched
    };

    let page = match fetched {
        Ok(FetchOutcome::Page(page)) => page,
        Ok(FetchOutcome::NotHtml { content_type }) => {
            return ItemOutcome::Skipped(SkipReason::NotHtml(content_type))
        }
        Err(e) => return ItemOutcome::Failed(e.to_string()),
    };

    let follow_links = item.depth < config.crawler.max_depth;
    let (record, links) = build_record(item, &page, follow_links);

    if let Err(e) = context.store.push(&record) {
        return ItemOutcome::Failed(format!("failed to persist result: {}", e));
    }

    ItemOutcome::Completed { record, links }
}

/// Runs both extractors over a fetched page
///
/// Links are only collected when the item is below the depth ceiling.
fn build_record(item: &WorkItem, page: &FetchedPage, follow_links: bool) -> (CrawlResult, Vec<Url>) {
    let document = Document::parse(&page.body);
    let content = extract_content(&document);
    let entities = extract_entities(&content.content);

    let links = if follow_links {
        document.links(&page.final_url)
    } else {
        Vec::new()
    };

    let record = CrawlResult {
        url: item.url.to_string(),
        title: content.title,
        content: content.content,
        headings: content.headings,
        tables: content.tables,
        entities,
        metadata: CrawlMetadata {
            crawled_at: Utc::now(),
            content_type: page.content_type.clone(),
            depth: item.depth,
        },
    };

    (record, links)
}

/// Logs an outcome, adds it to the tally, and hands back its links
fn record_outcome(context: &RunContext, item: &WorkItem, outcome: ItemOutcome) -> Vec<Url> {
    let state = outcome.state();
    let mut tally = context.tally.lock().unwrap_or_else(PoisonError::into_inner);

    match outcome {
        ItemOutcome::Completed { record, links } => {
            tracing::debug!(
                "{} -> {}: \"{}\" ({} entities, {} tables)",
                item.url,
                state,
                record.title,
                record.entities.len(),
                record.tables.len()
            );
            tally.completed += 1;
            tally.records.push(record);

            if tally.completed % PROGRESS_EVERY == 0 {
                tracing::info!(
                    "Progress: {} completed, {} failed, {} queued",
                    tally.completed,
                    tally.failed,
                    context.frontier.queued()
                );
            }
            links
        }
        ItemOutcome::Failed(reason) => {
            tracing::warn!("{} -> {}: {}", item.url, state, reason);
            tally.failed += 1;
            tally.failures.push(FailedItem {
                url: item.url.to_string(),
                reason,
            });
            Vec::new()
        }
        ItemOutcome::Skipped(reason) => {
            match &reason {
                SkipReason::Robots => {
                    tracing::info!("{} -> {}: disallowed by robots.txt", item.url, state);
                    tally.skipped.robots += 1;
                }
                SkipReason::NotHtml(content_type) => {
                    tracing::info!(
                        "{} -> {}: non-HTML content ({})",
                        item.url,
                        state,
                        content_type
                    );
                    tally.skipped.non_html += 1;
                }
                SkipReason::Cancelled => {
                    tracing::debug!("{} -> {}: abandoned on cancellation", item.url, state);
                    tally.skipped.cancelled += 1;
                }
            }
            Vec::new()
        }
    }
}

/// Runs a complete crawl operation against `store`
///
/// # Example
///
/// ```no_run
/// use stevie_crawler::config::load_config;
/// use stevie_crawler::crawler::run_crawl;
/// use stevie_crawler::MemoryStore;
/// use std::path::Path;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("crawler.toml"))?;
/// let report = run_crawl(config, Arc::new(MemoryStore::new())).await?;
/// println!("{} pages", report.completed);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, store: Arc<dyn ResultStore>) -> Result<CrawlReport> {
    Coordinator::new(config, store)?.run().await
}
