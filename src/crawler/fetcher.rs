//! HTTP search client implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Building the query URL for a term
//! - Classifying responses into search outcomes

use crate::config::{SearchConfig, UserAgentConfig};
use crate::crawler::client::{SearchClient, SearchOutcome};
use crate::crawler::parser::RecordExtractor;
use crate::term::Term;
use crate::HarvestError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Formats the user agent string: `Name/Version (+ContactURL; ContactEmail)`
pub fn format_user_agent(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use term_harvest::config::UserAgentConfig;
/// use term_harvest::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "TermHarvest".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(10)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(format_user_agent(config))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Search client backed by an HTML search endpoint
pub struct HttpSearchClient {
    client: Client,
    endpoint: Url,
    query_param: String,
    extractor: RecordExtractor,
}

impl HttpSearchClient {
    pub fn new(search: &SearchConfig, user_agent: &UserAgentConfig) -> Result<Self, HarvestError> {
        let client = build_http_client(user_agent, Duration::from_secs(search.timeout_secs))?;
        let endpoint = Url::parse(&search.endpoint)?;
        let extractor = RecordExtractor::new(&search.name_attribute, &search.domains_attribute)?;

        Ok(Self {
            client,
            endpoint,
            query_param: search.query_param.clone(),
            extractor,
        })
    }

    /// The request URL for `term`
    pub fn query_url(&self, term: &Term) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair(&self.query_param, term.as_str());
        url
    }
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    /// Runs one query
    ///
    /// | Condition | Outcome |
    /// |-----------|---------|
    /// | HTTP 200 | Success with extracted records |
    /// | HTTP 429 | RateLimited |
    /// | Other status | Failure |
    /// | Timeout / connect / body error | Transient |
    async fn search(&self, term: &Term) -> SearchOutcome {
        let url = self.query_url(term);

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return SearchOutcome::Transient(describe_transport_error(&e)),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return SearchOutcome::RateLimited;
        }
        if status != StatusCode::OK {
            return SearchOutcome::Failure(format!("HTTP {} for {}", status.as_u16(), url));
        }

        match response.text().await {
            Ok(body) => SearchOutcome::Success(self.extractor.extract(&body)),
            Err(e) => SearchOutcome::Transient(describe_transport_error(&e)),
        }
    }
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        "Connection refused".to_string()
    } else {
        e.to_string()
    }
}
