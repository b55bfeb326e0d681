//! HTTP fetcher
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the shared HTTP client with the configured user agent and timeout
//! - The retry policy (exponential backoff for transient failures)
//! - HTTP 429 handling through the per-domain rate limiter
//! - Error classification and the Content-Type gate

use crate::config::FetchConfig;
use crate::crawler::RateLimiter;
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Upper bound on a server-supplied Retry-After
const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

/// A successfully fetched HTML page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects; links resolve against this
    pub final_url: Url,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

/// Result of a fetch that did not fail
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// HTML page ready for extraction
    Page(FetchedPage),
    /// 2xx response that is not HTML; the body was not read
    NotHtml { content_type: String },
}

/// Why fetching an item failed for good
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {0} (not retryable)")]
    Status(u16),

    #[error("gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("still rate limited after {retries} retries")]
    RateLimited { retries: u32 },
}

/// Builds the HTTP client shared by every worker
///
/// # Arguments
///
/// * `user_agent` - Identifying string sent on every request
/// * `timeout` - Per-attempt request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use stevie_crawler::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client("stevie-crawler/0.1", Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches `url`, retrying transient failures
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx, HTML | Return the page |
/// | HTTP 2xx, other type | Return `NotHtml` without reading the body |
/// | HTTP 429 | Rate limiter backoff, then retry (own budget) |
/// | HTTP 5xx | Retry with exponential backoff |
/// | Timeout / connection error | Retry with exponential backoff |
/// | Other HTTP status | Fail immediately |
///
/// Every response other than a 429 counts toward the domain's success
/// streak. The caller is expected to hold a rate-limiter slot for `domain`
/// for the duration of this call; every retry is paced through the limiter
/// so it keeps the domain's spacing with sibling requests.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
/// * `domain` - Rate-limiter key for `url`
/// * `limiter` - The shared rate limiter
/// * `config` - Attempt ceilings and retry timing
pub async fn fetch_with_retry(
    client: &Client,
    url: &Url,
    domain: &str,
    limiter: &RateLimiter,
    config: &FetchConfig,
) -> Result<FetchOutcome, FetchError> {
    let mut failed_attempts = 0u32;
    let mut rate_limit_retries = 0u32;

    loop {
        if failed_attempts > 0 || rate_limit_retries > 0 {
            limiter.pace(domain).await;
        }

        let failure = match client.get(url.clone()).send().await {
            Ok(response) => {
                let status = response.status();

                if status == StatusCode::TOO_MANY_REQUESTS {
                    if rate_limit_retries >= config.max_rate_limit_retries {
                        return Err(FetchError::RateLimited {
                            retries: rate_limit_retries,
                        });
                    }
                    rate_limit_retries += 1;
                    let retry_after = parse_retry_after(response.headers());
                    limiter.handle_rate_limit_response(domain, retry_after).await;
                    continue;
                }

                limiter.record_success(domain);

                if status.is_success() {
                    match read_page(response).await {
                        Ok(outcome) => return Ok(outcome),
                        Err(e) => format!("failed to read body: {}", e),
                    }
                } else if status.is_server_error() {
                    format!("HTTP {}", status.as_u16())
                } else {
                    return Err(FetchError::Status(status.as_u16()));
                }
            }
            Err(e) => describe_transport_error(&e),
        };

        failed_attempts += 1;
        if failed_attempts >= config.max_attempts {
            return Err(FetchError::RetriesExhausted {
                attempts: failed_attempts,
                last_error: failure,
            });
        }

        let delay = config.retry_delay(failed_attempts);
        tracing::debug!(
            "Attempt {}/{} for {} failed ({}); retrying in {:?}",
            failed_attempts,
            config.max_attempts,
            url,
            failure,
            delay
        );
        tokio::time::sleep(delay).await;
    }
}

async fn read_page(response: Response) -> Result<FetchOutcome, reqwest::Error> {
    let status = response.status().as_u16();
    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !is_html(&content_type) {
        return Ok(FetchOutcome::NotHtml { content_type });
    }

    let body = response.text().await?;
    Ok(FetchOutcome::Page(FetchedPage {
        final_url,
        status,
        content_type,
        body,
    }))
}

/// Whether a Content-Type header value denotes an HTML document
///
/// A missing header is treated as HTML.
pub fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.is_empty() || mime == "text/html" || mime == "application/xhtml+xml"
}

/// Reads a `Retry-After` header as delta-seconds or an HTTP date
///
/// Dates in the past yield zero; values are capped at five minutes.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    let wait = if let Ok(secs) = value.parse::<u64>() {
        Duration::from_secs(secs)
    } else {
        let at = chrono::DateTime::parse_from_rfc2822(value).ok()?;
        let delta = at.with_timezone(&chrono::Utc) - chrono::Utc::now();
        delta.to_std().unwrap_or(Duration::ZERO)
    };

    Some(wait.min(MAX_RETRY_AFTER))
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else if error.is_redirect() {
        format!("redirect error: {}", error)
    } else {
        error.to_string()
    }
}
