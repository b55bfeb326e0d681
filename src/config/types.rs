use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the crawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Seed URLs, enqueued at depth 0
    pub seeds: Vec<String>,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub scope: ScopeConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Builds a configuration for the given seeds with every section at its defaults
    pub fn with_seeds<I, S>(seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            seeds: seeds.into_iter().map(Into::into).collect(),
            crawler: CrawlerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            fetch: FetchConfig::default(),
            scope: ScopeConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Run-level crawl limits
///
/// Immutable for the duration of a run.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Hard ceiling on the number of work items dequeued during a run
    ///
    /// This counts items, not HTTP requests: retries of an item, 429 retries
    /// and robots.txt fetches are not charged against it, so the number of
    /// requests sent can exceed this value.
    #[serde(rename = "max-requests-per-crawl", default = "default_max_requests")]
    pub max_requests_per_crawl: u32,

    /// Number of parallel workers pulling from the frontier
    #[serde(rename = "max-concurrency", default = "default_max_concurrency")]
    pub max_concurrency: u32,

    /// Courtesy delay applied after each successfully processed item (milliseconds)
    #[serde(rename = "request-delay-ms", default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Link-following depth ceiling; seeds are depth 0
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// User agent sent on every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Whether robots.txt rules are honoured
    #[serde(rename = "respect-robots-txt", default = "default_true")]
    pub respect_robots_txt: bool,
}

impl CrawlerConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_requests_per_crawl: default_max_requests(),
            max_concurrency: default_max_concurrency(),
            request_delay_ms: default_request_delay_ms(),
            max_depth: default_max_depth(),
            user_agent: default_user_agent(),
            respect_robots_txt: true,
        }
    }
}

/// Per-domain politeness settings used by the rate limiter
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Minimum spacing between two requests to the same domain (milliseconds)
    #[serde(rename = "min-delay-ms", default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Maximum number of in-flight requests per domain
    #[serde(rename = "max-concurrent-per-domain", default = "default_max_per_domain")]
    pub max_concurrent_per_domain: u32,

    /// Factor applied to the backoff multiplier on every 429 response
    #[serde(rename = "backoff-base", default = "default_backoff_base")]
    pub backoff_base: f64,

    /// Consecutive non-429 responses after which the backoff multiplier resets to 1
    #[serde(rename = "success-streak-reset", default = "default_success_streak")]
    pub success_streak_reset: u32,

    /// Upper bound for the backoff multiplier
    #[serde(rename = "max-backoff-multiplier", default = "default_max_multiplier")]
    pub max_backoff_multiplier: f64,
}

impl RateLimitConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_concurrent_per_domain: default_max_per_domain(),
            backoff_base: default_backoff_base(),
            success_streak_reset: default_success_streak(),
            max_backoff_multiplier: default_max_multiplier(),
        }
    }
}

/// HTTP fetch and retry settings
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Timeout for a single fetch attempt (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts for transport and server failures
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubled for every further attempt (milliseconds)
    #[serde(rename = "retry-base-delay-ms", default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Separate budget for retries triggered by HTTP 429
    #[serde(rename = "max-rate-limit-retries", default = "default_rate_limit_retries")]
    pub max_rate_limit_retries: u32,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Backoff to wait after the given failed attempt (1-based)
    pub fn retry_delay(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(1u64 << exponent))
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_rate_limit_retries: default_rate_limit_retries(),
        }
    }
}

/// Link-following scope as URL glob patterns
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    /// A discovered link must match at least one of these; empty means "the seed hosts"
    #[serde(default)]
    pub allow: Vec<String>,

    /// A discovered link matching any of these is never followed
    #[serde(default = "default_deny_patterns")]
    pub deny: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            allow: Vec::new(),
            deny: default_deny_patterns(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path", default = "default_summary_path")]
    pub summary_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            summary_path: default_summary_path(),
        }
    }
}

fn default_max_requests() -> u32 {
    50
}

fn default_max_concurrency() -> u32 {
    3
}

fn default_request_delay_ms() -> u64 {
    1000
}

fn default_max_depth() -> u32 {
    2
}

fn default_user_agent() -> String {
    format!("stevie-crawler/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}

fn default_min_delay_ms() -> u64 {
    1000
}

fn default_max_per_domain() -> u32 {
    2
}

fn default_backoff_base() -> f64 {
    2.0
}

fn default_success_streak() -> u32 {
    3
}

fn default_max_multiplier() -> f64 {
    64.0
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_rate_limit_retries() -> u32 {
    3
}

fn default_database_path() -> String {
    "./crawl.db".to_string()
}

fn default_summary_path() -> String {
    "./crawl-summary.md".to_string()
}

/// Binary assets plus sensitive or transactional paths
///
/// Asset globs match the extension at the end of the path. Auth and cart
/// globs match whole path segments, so `/cart` and `/cart/checkout` are
/// denied while `/cartoons-of-the-year` is not.
pub fn default_deny_patterns() -> Vec<String> {
    const SENSITIVE: &str = "{login,logout,register,signup,sign-up,cart,checkout,account,password}";

    let mut patterns: Vec<String> = [
        "**/*.{jpg,jpeg,png,gif,svg,webp,ico,bmp,tif,tiff}",
        "**/*.{zip,gz,tgz,rar,7z,tar}",
        "**/*.{pdf,doc,docx,xls,xlsx,ppt,pptx,csv}",
        "**/*.{mp3,mp4,mov,avi,wmv,webm}",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect();

    patterns.push(format!("**/{}", SENSITIVE));
    patterns.push(format!("**/{}/**", SENSITIVE));
    patterns
}
