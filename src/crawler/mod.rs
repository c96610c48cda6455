//! Crawler module for term dispatch and expansion
//!
//! This module contains the core crawling logic, including:
//! - The search client seam and its HTTP implementation
//! - Structured parsing of search result pages
//! - The frontier queue with join/close semantics
//! - Per-term expansion and the worker pool coordinator

mod client;
mod coordinator;
mod expansion;
mod fetcher;
mod frontier;
mod parser;

pub use client::{Record, SearchClient, SearchOutcome};
pub use coordinator::{run_crawl, Coordinator};
pub use expansion::{Expander, ExpansionOutcome, ExpansionReport};
pub use fetcher::{build_http_client, format_user_agent, HttpSearchClient};
pub use frontier::{Frontier, PushResult, QueuedTerm};
pub use parser::{parse_domain_list, ParseError, RecordExtractor};
