//! Robots.txt handling module
//!
//! Fetches, parses, and caches robots.txt files so disallowed URLs can be
//! skipped before any request is made for them.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::ParsedRobots;

use reqwest::Client;
use url::Url;

/// Fetches robots.txt for the origin of `url`
///
/// Never fails: a transport error or a non-2xx response yields permissive
/// rules, so an unreachable robots.txt does not block the crawl.
///
/// # Arguments
///
/// * `client` - HTTP client carrying the crawler's user agent and timeout
/// * `url` - Any URL on the origin to look up
pub async fn fetch_robots(client: &Client, url: &Url) -> ParsedRobots {
    let robots_url = match url.join("/robots.txt") {
        Ok(u) => u,
        Err(e) => {
            tracing::debug!("Cannot build robots.txt URL for {}: {}", url, e);
            return ParsedRobots::allow_all();
        }
    };

    let response = match client.get(robots_url.clone()).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!("robots.txt unreachable at {}: {}", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    if !response.status().is_success() {
        tracing::debug!(
            "robots.txt at {} returned {}; allowing all",
            robots_url,
            response.status()
        );
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => ParsedRobots::from_content(&body),
        Err(e) => {
            tracing::debug!("Failed to read robots.txt body from {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}
