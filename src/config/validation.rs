use crate::config::types::{
    Config, CrawlerConfig, FetchConfig, OutputConfig, RateLimitConfig, ScopeConfig,
};
use crate::url::UrlPattern;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_seeds(&config.seeds)?;
    validate_crawler_config(&config.crawler)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_fetch_config(&config.fetch)?;
    validate_scope_config(&config.scope)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates seed URLs: at least one, all absolute http(s) with a host
fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    if seeds.is_empty() {
        return Err(ConfigError::Validation(
            "at least one seed URL is required".to_string(),
        ));
    }

    for seed in seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use http or https",
                seed
            )));
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed URL '{}' has no host",
                seed
            )));
        }
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    // max_depth = 0 is a legitimate "seeds only" crawl

    if config.max_concurrency < 1 || config.max_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrency must be between 1 and 100, got {}",
            config.max_concurrency
        )));
    }

    if config.max_requests_per_crawl < 1 {
        return Err(ConfigError::Validation(format!(
            "max-requests-per-crawl must be >= 1, got {}",
            config.max_requests_per_crawl
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates rate limiter configuration
fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_per_domain < 1 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-per-domain must be >= 1, got {}",
            config.max_concurrent_per_domain
        )));
    }

    if !config.backoff_base.is_finite() || config.backoff_base <= 1.0 {
        return Err(ConfigError::Validation(format!(
            "backoff-base must be greater than 1, got {}",
            config.backoff_base
        )));
    }

    if !config.max_backoff_multiplier.is_finite() || config.max_backoff_multiplier < 1.0 {
        return Err(ConfigError::Validation(format!(
            "max-backoff-multiplier must be >= 1, got {}",
            config.max_backoff_multiplier
        )));
    }

    if config.success_streak_reset < 1 {
        return Err(ConfigError::Validation(format!(
            "success-streak-reset must be >= 1, got {}",
            config.success_streak_reset
        )));
    }

    Ok(())
}

/// Validates fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    Ok(())
}

/// Validates that every scope pattern compiles
fn validate_scope_config(config: &ScopeConfig) -> Result<(), ConfigError> {
    for pattern in config.allow.iter().chain(config.deny.iter()) {
        UrlPattern::new(pattern)?;
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
