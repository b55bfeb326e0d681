//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `ItemState`: lifecycle of a single work item (queued, in flight, terminal)
//! - `DomainState`: per-domain timing, concurrency and backoff bookkeeping for the rate limiter

mod domain_state;
mod item_state;

pub use domain_state::DomainState;
pub use item_state::ItemState;
