//! Output module for crawl progress and statistics
//!
//! This module handles:
//! - Live progress counters shared by the worker pool
//! - The end-of-crawl summary
//! - Statistics from the run ledger (`--stats`)

mod progress;
pub mod stats;

pub use progress::{CrawlProgress, ProgressSnapshot};
pub use stats::{load_statistics, print_statistics, print_summary, CrawlStatistics};
