//! Per-origin robots.txt cache for one crawl run

use crate::crawler::RateLimiter;
use crate::robots::{fetch_robots, ParsedRobots};
use crate::url::extract_domain;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use url::Url;

/// Caches robots.txt rules by origin
///
/// Each origin's robots.txt is fetched at most once per run, even when
/// several workers ask for it at the same time.
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<Arc<ParsedRobots>>>>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rules for `url`'s origin, fetching them on first use
    ///
    /// The fetch is paced through `limiter` like any other request to the
    /// domain.
    pub async fn rules_for(
        &self,
        client: &Client,
        limiter: &RateLimiter,
        url: &Url,
    ) -> Arc<ParsedRobots> {
        let origin = url.origin().ascii_serialization();

        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(origin.clone()).or_default())
        };

        cell.get_or_init(|| async {
            if let Some(domain) = extract_domain(url) {
                limiter.pace(&domain).await;
            }
            tracing::debug!("Fetching robots.txt for {}", origin);
            Arc::new(fetch_robots(client, url).await)
        })
        .await
        .clone()
    }

    #[cfg(test)]
    fn insert(&self, origin_url: &Url, rules: ParsedRobots) {
        let origin = origin_url.origin().ascii_serialization();
        let cell = OnceCell::new_with(Some(Arc::new(rules)));
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(origin, Arc::new(cell));
    }

    /// Checks `url` against its origin's rules
    pub async fn is_allowed(
        &self,
        client: &Client,
        limiter: &RateLimiter,
        url: &Url,
        user_agent: &str,
    ) -> bool {
        self.rules_for(client, limiter, url)
            .await
            .is_allowed(url.as_str(), user_agent)
    }

    /// Number of origins with cached (or in-progress) rules
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
