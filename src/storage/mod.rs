//! Storage module for persisting crawl results
//!
//! This module handles everything that outlives a process:
//! - The append-only `domain--entity` results file and its domains companion
//! - Crash recovery by re-reading prior results
//! - The optional SQLite ledger of runs and dispatched terms

mod ledger;
mod schema;
mod sink;
mod traits;

pub use ledger::SqliteLedger;
pub use sink::{load_existing, FileSink, PriorOutput};
pub use traits::{Ledger, ResultSink, StorageError, StorageResult};

use std::collections::HashSet;
use std::fmt;

/// Separator between domain and entity name in the results file
pub const ENTRY_SEPARATOR: &str = "--";

/// A persisted `(domain, entity_name)` pair
///
/// The full pair is the uniqueness key; the same domain may appear under
/// several entity names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultEntry {
    pub domain: String,
    pub entity_name: String,
}

impl ResultEntry {
    /// Builds an entry from raw search output
    ///
    /// Both fields go through [`clean_field`], so an entry always serializes
    /// to exactly one line and reads back to itself.
    pub fn new(domain: impl AsRef<str>, entity_name: impl AsRef<str>) -> Self {
        Self {
            domain: clean_field(domain.as_ref()),
            entity_name: clean_field(entity_name.as_ref()),
        }
    }

    /// Serializes the entry as one results-file line (without newline)
    pub fn to_line(&self) -> String {
        format!("{}{}{}", self.domain, ENTRY_SEPARATOR, self.entity_name)
    }

    /// Parses one results-file line
    ///
    /// The line is split on the first `--` that is not a punycode `xn--`
    /// marker at the start of a domain label, so IDN domains survive the
    /// round trip. Returns `None` for lines without a separator or with an
    /// empty side.
    ///
    /// # Examples
    ///
    /// ```
    /// use term_harvest::storage::ResultEntry;
    ///
    /// let entry = ResultEntry::parse_line("xn--80ak6aa92e.com--Школа").unwrap();
    /// assert_eq!(entry.domain, "xn--80ak6aa92e.com");
    /// assert_eq!(entry.entity_name, "Школа");
    /// ```
    pub fn parse_line(line: &str) -> Option<Self> {
        Self::parse_line_with_domains(line, &HashSet::new())
    }

    /// Parses one results-file line, resolving ambiguous separators
    ///
    /// A domain may itself contain `--` (`abc--d.edu`). When several splits
    /// are possible, the longest domain side found in `known_domains` wins;
    /// without a match this falls back to [`ResultEntry::parse_line`].
    pub fn parse_line_with_domains(line: &str, known_domains: &HashSet<String>) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let splits = separator_positions(line);

        let at = splits
            .iter()
            .rev()
            .find(|&&at| known_domains.contains(line[..at].trim()))
            .or_else(|| splits.first())?;

        Some(Self::new(&line[..*at], &line[*at + ENTRY_SEPARATOR.len()..]))
    }
}

/// Normalizes one results-file field
///
/// Runs of whitespace, including line breaks, collapse to a single space and
/// the ends are trimmed.
pub fn clean_field(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Byte offsets of every usable `--` separator in `line`
fn separator_positions(line: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut from = 0;

    while let Some(offset) = line[from..].find(ENTRY_SEPARATOR) {
        let at = from + offset;
        from = at + ENTRY_SEPARATOR.len();
        if is_punycode_marker(line, at) {
            continue;
        }
        if line[..at].trim().is_empty() || line[from..].trim().is_empty() {
            continue;
        }
        positions.push(at);
    }

    positions
}

/// True when the `--` at byte `at` belongs to an `xn--` label prefix
fn is_punycode_marker(line: &str, at: usize) -> bool {
    let head = &line[..at];
    if !head.to_ascii_lowercase().ends_with("xn") {
        return false;
    }
    let label_start = at - 2;
    label_start == 0 || head[..label_start].ends_with('.')
}

impl fmt::Display for ResultEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.domain, ENTRY_SEPARATOR, self.entity_name)
    }
}

/// Represents a run in the ledger
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Final outcome of one dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchOutcome {
    /// The search answered with a record list
    Success,
    /// Hard failure: bad status or malformed response
    Failed,
    /// Given up after the retry ceiling or on cancellation
    Abandoned,
}

impl DispatchOutcome {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }

    /// Whether the term got a definitive answer and need not be re-queried
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// One dispatch as stored in the ledger
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub term: String,
    pub outcome: DispatchOutcome,
    pub records: u32,
    pub new_entities: u32,
    pub throttles: u32,
}
