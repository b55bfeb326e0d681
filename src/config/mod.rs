//! Configuration module for the Stevie crawler
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use stevie_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    default_deny_patterns, Config, CrawlerConfig, FetchConfig, OutputConfig, RateLimitConfig,
    ScopeConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
