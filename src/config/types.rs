use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Term-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub search: SearchConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub seeds: SeedsConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of concurrent workers draining the frontier
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Sleep after the first throttle signal of a dispatch (seconds)
    #[serde(rename = "long-cooldown-secs", default = "default_long_cooldown")]
    pub long_cooldown_secs: u64,

    /// Sleep after every further throttle signal of the same dispatch (seconds)
    #[serde(rename = "short-cooldown-secs", default = "default_short_cooldown")]
    pub short_cooldown_secs: u64,

    /// Throttle retries allowed per dispatch; unbounded when absent
    #[serde(rename = "max-retries", default)]
    pub max_retries: Option<u32>,

    /// Pause after each dispatched term (milliseconds)
    #[serde(rename = "delay-between-terms-ms", default = "default_delay")]
    pub delay_between_terms_ms: u64,

    /// Cap on the total number of terms ever enqueued
    #[serde(rename = "max-terms", default)]
    pub max_terms: Option<u64>,

    /// Cap on derivation depth (seeds are depth 0)
    #[serde(rename = "max-depth", default)]
    pub max_depth: Option<u32>,

    /// Derived terms must be strictly longer than this
    #[serde(rename = "min-term-len", default = "default_min_term_len")]
    pub min_term_len: usize,

    /// Derived terms must be strictly shorter than this
    #[serde(rename = "max-term-len", default = "default_max_term_len")]
    pub max_term_len: usize,

    /// Longest contiguous word phrase derived from an entity name
    #[serde(rename = "max-phrase-words", default = "default_phrase_words")]
    pub max_phrase_words: usize,

    /// Dispatches between throughput log lines
    #[serde(rename = "progress-interval", default = "default_progress_interval")]
    pub progress_interval: u64,
}

impl CrawlerConfig {
    pub fn long_cooldown(&self) -> Duration {
        Duration::from_secs(self.long_cooldown_secs)
    }

    pub fn short_cooldown(&self) -> Duration {
        Duration::from_secs(self.short_cooldown_secs)
    }

    pub fn delay_between_terms(&self) -> Duration {
        Duration::from_millis(self.delay_between_terms_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            long_cooldown_secs: default_long_cooldown(),
            short_cooldown_secs: default_short_cooldown(),
            max_retries: None,
            delay_between_terms_ms: default_delay(),
            max_terms: None,
            max_depth: None,
            min_term_len: default_min_term_len(),
            max_term_len: default_max_term_len(),
            max_phrase_words: default_phrase_words(),
            progress_interval: default_progress_interval(),
        }
    }
}

/// Search endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the search endpoint
    pub endpoint: String,

    /// Query parameter that carries the term
    #[serde(rename = "query-param", default = "default_query_param")]
    pub query_param: String,

    /// Request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout")]
    pub timeout_secs: u64,

    /// HTML attribute holding the entity name
    #[serde(rename = "name-attribute", default = "default_name_attribute")]
    pub name_attribute: String,

    /// HTML attribute holding the bracketed domain list
    #[serde(rename = "domains-attribute", default = "default_domains_attribute")]
    pub domains_attribute: String,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Append-only `domain--entity` results file
    #[serde(rename = "results-path")]
    pub results_path: String,

    /// Companion file with one domain per line
    #[serde(rename = "domains-path")]
    pub domains_path: String,

    /// Optional SQLite ledger of runs and dispatched terms
    #[serde(rename = "ledger-path", default)]
    pub ledger_path: Option<String>,
}

/// Seed term sources
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedsConfig {
    /// Static seed terms
    #[serde(default)]
    pub terms: Vec<String>,

    /// Local wordlist files
    #[serde(default)]
    pub files: Vec<String>,

    /// Remote wordlists
    #[serde(default)]
    pub urls: Vec<String>,

    /// Length of generated alphabetic prefixes (0 disables)
    #[serde(rename = "generate-prefixes", default)]
    pub generate_prefixes: usize,

    /// Pre-populate seen terms from the ledger on restart
    #[serde(rename = "restore-seen-terms", default)]
    pub restore_seen_terms: bool,
}

fn default_workers() -> u32 {
    10
}

fn default_long_cooldown() -> u64 {
    4200
}

fn default_short_cooldown() -> u64 {
    300
}

fn default_delay() -> u64 {
    1000
}

fn default_min_term_len() -> usize {
    2
}

fn default_max_term_len() -> usize {
    40
}

fn default_phrase_words() -> usize {
    1
}

fn default_progress_interval() -> u64 {
    10
}

fn default_query_param() -> String {
    "q".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_name_attribute() -> String {
    "data-school-name".to_string()
}

fn default_domains_attribute() -> String {
    "data-email-domains".to_string()
}
