use crate::config::RateLimitConfig;
use std::time::Duration;
use tokio::time::Instant;

/// Rate-limiter bookkeeping for a single domain
///
/// Created lazily on the first request for a domain and kept for the
/// lifetime of the [`RateLimiter`](crate::crawler::RateLimiter) that owns it.
/// Only the rate limiter mutates it, always under its lock.
#[derive(Debug, Clone)]
pub struct DomainState {
    /// Lowercase host this state belongs to
    pub domain: String,

    /// When the last request to this domain was let through
    pub last_request_time: Option<Instant>,

    /// Slots currently held; never above the per-domain limit
    pub active_requests: u32,

    /// Scales the minimum spacing after throttling; always >= 1.0
    pub backoff_multiplier: f64,

    /// Consecutive non-429 responses since the last throttle
    pub success_streak: u32,
}

impl DomainState {
    /// Creates a new DomainState with no history and no backoff
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            last_request_time: None,
            active_requests: 0,
            backoff_multiplier: 1.0,
            success_streak: 0,
        }
    }

    /// Spacing currently required between two requests
    ///
    /// # Arguments
    ///
    /// * `config` - Rate limiter settings (minimum delay)
    ///
    /// # Returns
    ///
    /// `min-delay * backoff_multiplier`
    pub fn required_delay(&self, config: &RateLimitConfig) -> Duration {
        config.min_delay().mul_f64(self.backoff_multiplier)
    }

    /// Returns true if another slot may be taken without exceeding the limit
    pub fn has_free_slot(&self, config: &RateLimitConfig) -> bool {
        self.active_requests < config.max_concurrent_per_domain
    }

    /// Time left before the required spacing since the last request has elapsed
    ///
    /// Returns None if a request can be issued at `now`.
    pub fn time_until_ready(&self, config: &RateLimitConfig, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let required = self.required_delay(config);
        let elapsed = now.saturating_duration_since(last);
        if elapsed < required {
            Some(required - elapsed)
        } else {
            None
        }
    }

    /// Takes a slot and stamps the request time
    pub fn record_acquire(&mut self, now: Instant) {
        self.active_requests += 1;
        self.record_request(now);
    }

    /// Stamps the request time without taking a slot
    pub fn record_request(&mut self, now: Instant) {
        self.last_request_time = Some(now);
    }

    /// Gives a slot back; floored at zero
    pub fn record_release(&mut self) {
        if self.active_requests == 0 {
            tracing::warn!(
                "Slot released for {} with no active requests",
                self.domain
            );
        }
        self.active_requests = self.active_requests.saturating_sub(1);
    }

    /// Escalates the backoff multiplier after a 429
    ///
    /// The multiplier is multiplied by `backoff-base` and capped at
    /// `max-backoff-multiplier`. The success streak starts over.
    pub fn escalate_backoff(&mut self, config: &RateLimitConfig) -> f64 {
        self.backoff_multiplier =
            (self.backoff_multiplier * config.backoff_base).min(config.max_backoff_multiplier);
        self.success_streak = 0;
        self.backoff_multiplier
    }

    /// Counts a non-429 response
    ///
    /// # Returns
    ///
    /// `true` if the streak has reached `success-streak-reset` while backed off,
    /// meaning the caller should reset the backoff.
    pub fn record_success(&mut self, config: &RateLimitConfig) -> bool {
        self.success_streak = self.success_streak.saturating_add(1);
        self.backoff_multiplier > 1.0 && self.success_streak >= config.success_streak_reset
    }

    /// Drops the backoff multiplier back to 1
    pub fn reset_backoff(&mut self) {
        self.backoff_multiplier = 1.0;
        self.success_streak = 0;
    }
}
