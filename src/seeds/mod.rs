//! Seed term supplier
//!
//! Collects the initial frontier from every configured source:
//! - Static terms from the configuration
//! - Local wordlist files
//! - Remote wordlists fetched over HTTP
//! - Generated alphabetic prefixes (`aa`, `ab`, ...)
//!
//! A source that fails is logged and skipped; the crawl starts with
//! whatever loaded.

use crate::config::SeedsConfig;
use crate::term::Term;
use reqwest::{Client, StatusCode};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Errors from a single seed source
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read wordlist {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to fetch wordlist {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Wordlist {url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
}

/// Splits wordlist text into raw terms
///
/// Terms are separated by newlines or commas. Blank entries and lines
/// starting with `#` are ignored.
pub fn parse_wordlist(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .flat_map(|line| line.split(','))
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads a local wordlist file
pub fn read_wordlist(path: &Path) -> Result<Vec<String>, SeedError> {
    let text = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_wordlist(&text))
}

/// Downloads a remote wordlist
pub async fn fetch_wordlist(client: &Client, url: &str) -> Result<Vec<String>, SeedError> {
    let http_error = |source| SeedError::Http {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).send().await.map_err(http_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(SeedError::Status {
            url: url.to_string(),
            status,
        });
    }

    let text = response.text().await.map_err(http_error)?;
    Ok(parse_wordlist(&text))
}

/// Every lowercase ASCII string of exactly `len` letters, in order
///
/// `len` is bounded by configuration validation; 0 yields nothing.
pub fn generate_prefixes(len: usize) -> Vec<String> {
    if len == 0 {
        return Vec::new();
    }

    let mut prefixes = vec![String::new()];
    for _ in 0..len {
        prefixes = prefixes
            .iter()
            .flat_map(|prefix| {
                ('a'..='z').map(move |c| {
                    let mut next = prefix.clone();
                    next.push(c);
                    next
                })
            })
            .collect();
    }
    prefixes
}

/// Collects, normalizes and de-duplicates seed terms from all sources
///
/// Order is preserved: static terms first, then files, urls and
/// generated prefixes, each in configuration order.
pub async fn collect_seeds(config: &SeedsConfig, client: &Client) -> Vec<Term> {
    let mut raw: Vec<String> = config.terms.clone();

    for path in &config.files {
        match read_wordlist(Path::new(path)) {
            Ok(terms) => {
                tracing::info!("Loaded {} seed terms from {}", terms.len(), path);
                raw.extend(terms);
            }
            Err(e) => tracing::warn!("Skipping seed source: {}", e),
        }
    }

    for url in &config.urls {
        match fetch_wordlist(client, url).await {
            Ok(terms) => {
                tracing::info!("Downloaded {} seed terms from {}", terms.len(), url);
                raw.extend(terms);
            }
            Err(e) => tracing::warn!("Skipping seed source: {}", e),
        }
    }

    raw.extend(generate_prefixes(config.generate_prefixes));

    let seeds = dedup_terms(raw);
    tracing::info!("Collected {} unique seed terms", seeds.len());
    seeds
}

fn dedup_terms(raw: Vec<String>) -> Vec<Term> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(|s| Term::new(s))
        .filter(|term| seen.insert(term.clone()))
        .collect()
}
