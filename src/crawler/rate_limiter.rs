//! Per-domain rate limiter
//!
//! Gates every request on three rules, each tracked independently per domain:
//! - at most `max-concurrent-per-domain` requests in flight
//! - consecutive requests at least `min-delay * backoff_multiplier` apart,
//!   including retries sent under an already held slot
//! - the backoff multiplier grows on HTTP 429 and resets after a success streak
//!
//! All `DomainState`s live in one map behind one mutex. The lock is never held
//! across an await; waiting happens on a timer or on the release notification.

use crate::config::RateLimitConfig;
use crate::state::DomainState;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// What an `acquire_slot` attempt has to wait for before retrying
enum Gate {
    FreeSlot,
    Spacing(Duration),
}

/// Per-domain rate limiter shared by all crawl workers
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    domains: Mutex<HashMap<String, DomainState>>,
    released: Notify,
}

impl RateLimiter {
    /// Creates a limiter with no domain history
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            domains: Mutex::new(HashMap::new()),
            released: Notify::new(),
        }
    }

    fn domains(&self) -> MutexGuard<'_, HashMap<String, DomainState>> {
        self.domains.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits until a request to `domain` may be issued, then takes a slot
    ///
    /// Suspends while the domain is at its concurrency limit (until some slot
    /// is released) or while the required spacing since the last grant has
    /// not elapsed. The capacity check and the increment happen under one
    /// lock, so concurrent callers can never overshoot the limit. Waiters are
    /// not served in FIFO order.
    ///
    /// Every successful call must be paired with one [`release_slot`](Self::release_slot);
    /// [`slot`](Self::slot) does the pairing automatically.
    pub async fn acquire_slot(&self, domain: &str) {
        loop {
            let released = self.released.notified();
            tokio::pin!(released);

            let gate = {
                let mut domains = self.domains();
                let state = domains
                    .entry(domain.to_string())
                    .or_insert_with(|| DomainState::new(domain));

                if !state.has_free_slot(&self.config) {
                    // Register before unlocking so a release in between is not missed
                    released.as_mut().enable();
                    Gate::FreeSlot
                } else if let Some(remaining) = state.time_until_ready(&self.config, Instant::now())
                {
                    Gate::Spacing(remaining)
                } else {
                    state.record_acquire(Instant::now());
                    tracing::trace!(
                        "Slot granted for {} ({} active, backoff x{})",
                        domain,
                        state.active_requests,
                        state.backoff_multiplier
                    );
                    return;
                }
            };

            match gate {
                Gate::FreeSlot => {
                    tracing::trace!("Waiting for a free slot on {}", domain);
                    released.await;
                }
                Gate::Spacing(remaining) => {
                    tracing::trace!("Spacing requests to {}: waiting {:?}", domain, remaining);
                    tokio::time::sleep(remaining).await;
                }
            }
        }
    }

    /// Waits out the domain's spacing and stamps a new request time
    ///
    /// For requests sent without taking a slot of their own: retries made
    /// while the item's slot is held, and the robots.txt fetch. The active
    /// count is untouched.
    pub async fn pace(&self, domain: &str) {
        loop {
            let remaining = {
                let mut domains = self.domains();
                let state = domains
                    .entry(domain.to_string())
                    .or_insert_with(|| DomainState::new(domain));

                match state.time_until_ready(&self.config, Instant::now()) {
                    Some(remaining) => remaining,
                    None => {
                        state.record_request(Instant::now());
                        return;
                    }
                }
            };

            tracing::trace!("Pacing request to {}: waiting {:?}", domain, remaining);
            tokio::time::sleep(remaining).await;
        }
    }

    /// Gives back a slot taken by [`acquire_slot`](Self::acquire_slot)
    ///
    /// The active count is floored at zero.
    pub fn release_slot(&self, domain: &str) {
        {
            let mut domains = self.domains();
            match domains.get_mut(domain) {
                Some(state) => state.record_release(),
                None => tracing::warn!("Slot released for unknown domain {}", domain),
            }
        }
        self.released.notify_waiters();
    }

    /// Acquires a slot and returns a guard that releases it on drop
    pub async fn slot(&self, domain: &str) -> DomainSlot<'_> {
        self.acquire_slot(domain).await;
        DomainSlot {
            limiter: self,
            domain: domain.to_string(),
        }
    }

    /// Escalates backoff for `domain` after an HTTP 429, then waits
    ///
    /// The multiplier is multiplied by `backoff-base` (capped at
    /// `max-backoff-multiplier`). The wait is the server's `Retry-After` when
    /// given, else `min-delay * new multiplier`. Slot counts are untouched.
    ///
    /// # Returns
    ///
    /// The duration that was waited
    pub async fn handle_rate_limit_response(
        &self,
        domain: &str,
        retry_after: Option<Duration>,
    ) -> Duration {
        let (multiplier, wait) = {
            let mut domains = self.domains();
            let state = domains
                .entry(domain.to_string())
                .or_insert_with(|| DomainState::new(domain));
            let multiplier = state.escalate_backoff(&self.config);
            let wait = retry_after.unwrap_or_else(|| state.required_delay(&self.config));
            (multiplier, wait)
        };

        tracing::info!(
            "Rate limited by {}: backoff x{}, waiting {:?}",
            domain,
            multiplier,
            wait
        );

        tokio::time::sleep(wait).await;
        wait
    }

    /// Resets the backoff multiplier for `domain` to 1
    pub fn reset_backoff(&self, domain: &str) {
        if let Some(state) = self.domains().get_mut(domain) {
            state.reset_backoff();
        }
    }

    /// Counts a non-429 response for `domain`
    ///
    /// After `success-streak-reset` consecutive ones the backoff is reset.
    pub fn record_success(&self, domain: &str) {
        let mut domains = self.domains();
        let Some(state) = domains.get_mut(domain) else {
            return;
        };

        if state.record_success(&self.config) {
            tracing::debug!(
                "Success streak on {}; resetting backoff from x{}",
                domain,
                state.backoff_multiplier
            );
            state.reset_backoff();
        }
    }

    /// Requests currently in flight for `domain`
    pub fn active_requests(&self, domain: &str) -> u32 {
        self.domains()
            .get(domain)
            .map(|s| s.active_requests)
            .unwrap_or(0)
    }

    /// Current backoff multiplier for `domain` (1.0 if never throttled)
    pub fn backoff_multiplier(&self, domain: &str) -> f64 {
        self.domains()
            .get(domain)
            .map(|s| s.backoff_multiplier)
            .unwrap_or(1.0)
    }

    /// Snapshot of a domain's state
    pub fn domain_state(&self, domain: &str) -> Option<DomainState> {
        self.domains().get(domain).cloned()
    }
}

/// A held per-domain slot; released when dropped
#[derive(Debug)]
pub struct DomainSlot<'a> {
    limiter: &'a RateLimiter,
    domain: String,
}

impl Drop for DomainSlot<'_> {
    fn drop(&mut self) {
        self.limiter.release_slot(&self.domain);
    }
}
