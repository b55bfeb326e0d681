//! Crawl frontier
//!
//! Holds the queue of `(url, depth)` work items, the set of URLs already seen,
//! the in-flight count and the global request budget. All of it sits behind a
//! single mutex, so "is this URL new?" and "enqueue it" are one atomic step
//! and a worker can never observe an empty queue while a sibling is about to
//! refill it.

use crate::url::LinkFilter;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use url::Url;

/// One unit of crawl work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub url: Url,
    /// Link distance from the nearest seed; seeds are 0
    pub depth: u32,
}

/// Why the frontier stopped handing out work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Queue empty and nothing in flight that could refill it
    Exhausted,
    /// `max-requests-per-crawl` items have been dequeued
    BudgetReached,
    /// The run was cancelled
    Cancelled,
}

/// Result of asking the frontier for work
#[derive(Debug)]
pub enum Next {
    Item(WorkItem),
    Stop(StopReason),
}

/// What happened to the links reported by a finished item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnqueueOutcome {
    pub enqueued: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

#[derive(Debug, Default)]
struct FrontierState {
    queue: VecDeque<WorkItem>,
    seen: HashSet<String>,
    rejected: HashSet<String>,
    in_flight: usize,
    dispatched: u32,
}

/// Shared crawl frontier
#[derive(Debug)]
pub struct Frontier {
    budget: u32,
    filter: LinkFilter,
    state: Mutex<FrontierState>,
    changed: Notify,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `budget` - Maximum number of items ever dequeued
    /// * `filter` - Scope filter applied to discovered links (not to seeds)
    pub fn new(budget: u32, filter: LinkFilter) -> Self {
        Self {
            budget,
            filter,
            state: Mutex::new(FrontierState::default()),
            changed: Notify::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues seed URLs at depth 0, skipping duplicates
    ///
    /// # Returns
    ///
    /// Number of seeds actually enqueued
    pub fn seed<I>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = Url>,
    {
        let mut enqueued = 0;
        {
            let mut state = self.state();
            for url in urls {
                if state.seen.insert(url.as_str().to_string()) {
                    state.queue.push_back(WorkItem { url, depth: 0 });
                    enqueued += 1;
                }
            }
        }
        self.changed.notify_waiters();
        enqueued
    }

    /// Takes the next work item, waiting while siblings may still add links
    ///
    /// Stops once the run is cancelled, the budget is spent, or the queue is
    /// empty with nothing in flight. A returned item counts against the
    /// budget and as in flight until [`finish`](Self::finish) is called.
    pub async fn next(&self, cancel: &CancellationToken) -> Next {
        loop {
            let changed = self.changed.notified();
            tokio::pin!(changed);

            {
                let mut state = self.state();

                if cancel.is_cancelled() {
                    return Next::Stop(StopReason::Cancelled);
                }
                if state.dispatched >= self.budget {
                    return Next::Stop(StopReason::BudgetReached);
                }
                if let Some(item) = state.queue.pop_front() {
                    state.dispatched += 1;
                    state.in_flight += 1;
                    return Next::Item(item);
                }
                if state.in_flight == 0 {
                    return Next::Stop(StopReason::Exhausted);
                }

                changed.as_mut().enable();
            }

            tokio::select! {
                _ = &mut changed => {}
                _ = cancel.cancelled() => return Next::Stop(StopReason::Cancelled),
            }
        }
    }

    /// Marks an in-flight item as done and enqueues its discovered links
    ///
    /// Each link is checked against the scope filter first, then against the
    /// seen set; survivors are queued at `child_depth`. Pass no links for
    /// items that failed, were skipped, or sit at the depth ceiling.
    pub fn finish(&self, links: &[Url], child_depth: u32) -> EnqueueOutcome {
        let mut outcome = EnqueueOutcome::default();
        {
            let mut state = self.state();

            for link in links {
                let key = link.as_str();

                if !self.filter.classify(link).should_follow() {
                    if !state.seen.contains(key) && state.rejected.insert(key.to_string()) {
                        outcome.rejected += 1;
                    }
                    continue;
                }

                if state.seen.insert(key.to_string()) {
                    state.queue.push_back(WorkItem {
                        url: link.clone(),
                        depth: child_depth,
                    });
                    outcome.enqueued += 1;
                } else {
                    outcome.duplicates += 1;
                }
            }

            state.in_flight = state.in_flight.saturating_sub(1);
        }

        self.changed.notify_waiters();
        outcome
    }

    /// Items still waiting in the queue
    pub fn queued(&self) -> usize {
        self.state().queue.len()
    }

    /// Items dequeued so far
    pub fn dispatched(&self) -> u32 {
        self.state().dispatched
    }

    /// Items dequeued but not yet finished
    pub fn in_flight(&self) -> usize {
        self.state().in_flight
    }

    /// Distinct discovered links rejected by the scope filter
    pub fn rejected(&self) -> usize {
        self.state().rejected.len()
    }
}
