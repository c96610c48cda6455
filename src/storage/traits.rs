//! Storage traits and error types
//!
//! This module defines the trait interfaces for the result sink and the run
//! ledger, and their shared error type.

use crate::storage::{DispatchOutcome, DispatchRecord, ResultEntry, RunRecord, RunStatus};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    File {
        path: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable, de-duplicating destination for result entries
///
/// The seen-check and the write happen under one lock, so concurrent
/// callers can never write the same entry twice.
pub trait ResultSink: Send + Sync {
    /// Persists `entry` unless it was already persisted
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The entry was new and is now durably written
    /// * `Ok(false)` - The entry was already known; nothing was written
    /// * `Err(StorageError)` - The write failed; the entry is not marked seen
    fn append_if_new(&self, entry: &ResultEntry) -> StorageResult<bool>;

    /// Number of distinct entries known to the sink (prior + written)
    fn known_entries(&self) -> usize;
}

/// Trait for run-ledger backends
///
/// The ledger is optional bookkeeping: which runs happened and which terms
/// were dispatched with what outcome.
pub trait Ledger {
    // ===== Run Management =====

    /// Creates a new run and returns its ID
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run as finished with the given status
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Counts all runs
    fn count_runs(&self) -> StorageResult<u64>;

    // ===== Dispatch Tracking =====

    /// Records one dispatch of a term
    fn record_dispatch(&mut self, run_id: i64, record: &DispatchRecord) -> StorageResult<()>;

    /// Terms whose dispatch reached a final answer in any run
    fn load_dispatched_terms(&self) -> StorageResult<Vec<String>>;

    // ===== Statistics =====

    /// Counts dispatches by outcome
    fn count_by_outcome(&self) -> StorageResult<HashMap<DispatchOutcome, u64>>;

    /// Sums `(records, new_entities, throttles)` over all dispatches
    fn sum_dispatch_totals(&self) -> StorageResult<(u64, u64, u64)>;

    /// Counts distinct dispatched terms
    fn count_distinct_terms(&self) -> StorageResult<u64>;
}
