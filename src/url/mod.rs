//! URL handling module for the Stevie crawler
//!
//! This module provides domain extraction, URL glob patterns, and the
//! link-following scope filter.

mod domain;
mod matcher;

use crate::config::Config;
use crate::ConfigError;
use ::url::Url;

pub use domain::{extract_domain, parse_http_url};
pub use matcher::UrlPattern;

/// Outcome of checking a discovered link against the crawl scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkClassification {
    /// Matches an allow pattern and no deny pattern
    Allowed,
    /// Matches a deny pattern (binary asset, auth or transactional path)
    Denied,
    /// Matches no allow pattern, or is not http(s)
    OutOfScope,
}

impl LinkClassification {
    /// Returns true if the link may be enqueued
    pub fn should_follow(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Allow/deny glob filter applied to every discovered link
#[derive(Debug, Clone)]
pub struct LinkFilter {
    allow: Vec<UrlPattern>,
    deny: Vec<UrlPattern>,
}

impl LinkFilter {
    /// Compiles a filter from explicit pattern lists
    pub fn new(allow: &[String], deny: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            allow: compile_all(allow)?,
            deny: compile_all(deny)?,
        })
    }

    /// Builds the filter for a run
    ///
    /// An empty allow list is replaced by one `<scheme>://<host>/**` pattern
    /// per distinct seed origin, so the crawl stays on the seeds' sites.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let allow = if config.scope.allow.is_empty() {
            seed_scope_patterns(&config.seeds)?
        } else {
            config.scope.allow.clone()
        };

        Self::new(&allow, &config.scope.deny)
    }

    /// Classifies a link
    ///
    /// Deny patterns take priority over allow patterns.
    pub fn classify(&self, url: &Url) -> LinkClassification {
        if url.scheme() != "http" && url.scheme() != "https" {
            return LinkClassification::OutOfScope;
        }

        let candidate = url.as_str();

        if self.deny.iter().any(|p| p.matches(candidate)) {
            return LinkClassification::Denied;
        }

        if self.allow.iter().any(|p| p.matches(candidate)) {
            LinkClassification::Allowed
        } else {
            LinkClassification::OutOfScope
        }
    }

    /// The allow patterns in effect
    pub fn allow_patterns(&self) -> impl Iterator<Item = &str> {
        self.allow.iter().map(UrlPattern::as_str)
    }
}

fn compile_all(globs: &[String]) -> Result<Vec<UrlPattern>, ConfigError> {
    globs.iter().map(|g| UrlPattern::new(g)).collect()
}

fn seed_scope_patterns(seeds: &[String]) -> Result<Vec<String>, ConfigError> {
    let mut patterns: Vec<String> = Vec::new();

    for seed in seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::InvalidUrl(format!("Seed URL '{}' has no host", seed)))?;

        let origin = match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        };
        let pattern = format!("{}/**", origin);

        if !patterns.contains(&pattern) {
            patterns.push(pattern);
        }
    }

    Ok(patterns)
}
