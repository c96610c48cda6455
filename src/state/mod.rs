//! State module for tracking crawl progress
//!
//! This module provides the shared, concurrency-safe state of a crawl.
//!
//! # Components
//!
//! - `SeenSet`: Insertion-only set with atomic mark-if-new
//! - `BackoffController`: Per-dispatch throttle escalation (long, then short cooldowns)
//! - `CrawlState`: Seen terms, seen entities, the frontier and the result sink

mod backoff;
mod crawl_state;
mod dedup;

// Re-export main types
pub use backoff::{BackoffController, BackoffDecision, BackoffPolicy, ThrottleState};
pub use crawl_state::CrawlState;
pub use dedup::SeenSet;
