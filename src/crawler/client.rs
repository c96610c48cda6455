//! Search client seam
//!
//! The crawler core only needs one operation from the outside world: run a
//! query for a term and report what came back.

use crate::term::Term;
use async_trait::async_trait;

/// One discovered entity with its associated domains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Display name of the entity, as returned by the search
    pub entity_name: String,
    /// Associated domains in source order; may be empty
    pub domains: Vec<String>,
}

impl Record {
    pub fn new<S: Into<String>>(entity_name: impl Into<String>, domains: Vec<S>) -> Self {
        Self {
            entity_name: entity_name.into(),
            domains: domains.into_iter().map(Into::into).collect(),
        }
    }

    /// A record whose domain payload was empty or unreadable
    pub fn without_domains(entity_name: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            domains: Vec::new(),
        }
    }
}

/// Result of one search query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The search answered with a (possibly empty) record list
    Success(Vec<Record>),
    /// The endpoint signalled a rate limit (HTTP 429)
    RateLimited,
    /// Transport-level problem (timeout, connection reset, ...); retried
    /// with the same escalation as a rate limit
    Transient(String),
    /// Bad status or malformed response; the term is abandoned
    Failure(String),
}

impl SearchOutcome {
    /// Whether this outcome should go through the backoff controller
    pub fn is_throttle(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Transient(_))
    }
}

/// Performs one network query per call
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, term: &Term) -> SearchOutcome;
}
