//! Term-Harvest: a keyword-expanding discovery crawler
//!
//! This crate implements a bounded-concurrency crawler that queries a
//! rate-limited search endpoint, records the `(domain, entity)` pairs it
//! finds, and derives new search terms from every newly discovered entity.

pub mod config;
pub mod crawler;
pub mod output;
pub mod seeds;
pub mod state;
pub mod storage;
pub mod term;

use thiserror::Error;

/// Main error type for Term-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("{0} results could not be persisted")]
    Unpersisted(usize),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Term-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Record, SearchClient, SearchOutcome};
pub use state::{BackoffController, CrawlState};
pub use storage::ResultEntry;
pub use term::{derive_terms, normalize_term, Term};
