//! stevie-crawler main entry point
//!
//! This is the command-line interface for the Stevie awards-site crawler.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stevie_crawler::config::{load_config_with_hash, Config};
use stevie_crawler::crawler::crawl;
use stevie_crawler::output::{export_summary, load_statistics, print_report, print_statistics};
use stevie_crawler::storage::{open_storage, ResultStore, RunStatus};
use stevie_crawler::LinkFilter;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// stevie-crawler: a polite crawler for awards-program websites
///
/// Fetches pages from the configured seeds within request, depth and
/// per-domain rate limits, and stores title, headings, body text, tables and
/// award/category/date/price mentions for every page in a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "stevie-crawler")]
#[command(version)]
#[command(about = "A polite crawler for awards-program websites", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export_summary"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary"])]
    stats: bool,

    /// Generate markdown summary from existing data and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_summary: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_summary {
        handle_export_summary(&config)?;
    } else {
        handle_crawl(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG` overrides the verbosity flags when set.
fn setup_logging(verbose: u8, quiet: bool) {
    let default_filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "stevie_crawler=info,warn",
            1 => "stevie_crawler=debug,info",
            2 => "stevie_crawler=trace,debug",
            _ => "trace",
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let filter = LinkFilter::from_config(config)?;

    println!("=== Stevie Crawler Dry Run ===\n");

    println!("Crawler:");
    println!("  Max requests per crawl: {}", config.crawler.max_requests_per_crawl);
    println!("  Max concurrency: {}", config.crawler.max_concurrency);
    println!("  Request delay: {}ms", config.crawler.request_delay_ms);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  User agent: {}", config.crawler.user_agent);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots_txt);

    println!("\nRate Limit (per domain):");
    println!("  Min delay: {}ms", config.rate_limit.min_delay_ms);
    println!(
        "  Max concurrent: {}",
        config.rate_limit.max_concurrent_per_domain
    );
    println!(
        "  Backoff: x{} per 429, capped at x{}, reset after {} successes",
        config.rate_limit.backoff_base,
        config.rate_limit.max_backoff_multiplier,
        config.rate_limit.success_streak_reset
    );

    println!("\nFetch:");
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    println!("  Max attempts: {}", config.fetch.max_attempts);
    println!("  Retry base delay: {}ms", config.fetch.retry_base_delay_ms);
    println!("  Max 429 retries: {}", config.fetch.max_rate_limit_retries);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Summary: {}", config.output.summary_path);

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  - {}", seed);
    }

    println!("\nAllow Patterns:");
    for pattern in filter.allow_patterns() {
        println!("  - {}", pattern);
    }

    println!("\nDeny Patterns ({}):", config.scope.deny.len());
    for pattern in &config.scope.deny {
        println!("  - {}", pattern);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} seed URLs",
        config.seeds.len()
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_storage(Path::new(&config.output.database_path))?;

    let mut stats = load_statistics(&store)?;
    stats.last_run = store.latest_run()?;

    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-summary mode: generates markdown summary
fn handle_export_summary(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Exporting Crawl Summary ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.summary_path);
    println!();

    let store = open_storage(Path::new(&config.output.database_path))?;
    let last_run = store.latest_run()?;

    tracing::info!("Generating markdown summary...");
    export_summary(&store, last_run, Path::new(&config.output.summary_path))?;

    println!("✓ Summary exported to: {}", config.output.summary_path);

    Ok(())
}

/// Handles the main crawl operation
///
/// Ctrl-C cancels the run; the partial report is still printed and the
/// run is recorded as cancelled.
async fn handle_crawl(config: Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(open_storage(Path::new(&config.output.database_path))?);
    let run_id = store.create_run(config_hash)?;
    let summary_path = PathBuf::from(&config.output.summary_path);

    tracing::info!(
        "Run {}: {} seed(s), database {}",
        run_id,
        config.seeds.len(),
        config.output.database_path
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received; stopping crawl");
                cancel.cancel();
            }
        });
    }

    let result_store: Arc<dyn ResultStore> = store.clone();
    let report = match crawl(config, result_store, cancel).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            store.finish_run(run_id, RunStatus::Failed, 0, 0, 0)?;
            return Err(e.into());
        }
    };

    store.finish_run(
        run_id,
        report.run_status(),
        report.completed,
        report.failed,
        report.skipped_total(),
    )?;

    print_report(&report);

    export_summary(store.as_ref(), store.latest_run()?, &summary_path)?;

    Ok(())
}
