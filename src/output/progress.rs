//! Live crawl counters
//!
//! Workers bump these atomics as they go; the coordinator logs a progress
//! line every few dispatches and a summary when the run ends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters shared by all workers of one run
#[derive(Debug)]
pub struct CrawlProgress {
    started: Instant,
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    abandoned: AtomicU64,
    throttles: AtomicU64,
    records: AtomicU64,
    new_entities: AtomicU64,
    results_written: AtomicU64,
    terms_enqueued: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub elapsed: Duration,
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub abandoned: u64,
    pub throttles: u64,
    pub records: u64,
    pub new_entities: u64,
    pub results_written: u64,
    pub terms_enqueued: u64,
}

impl ProgressSnapshot {
    /// Dispatches per second since the run started
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.dispatched as f64 / secs
        } else {
            0.0
        }
    }
}

impl CrawlProgress {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            dispatched: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
            throttles: AtomicU64::new(0),
            records: AtomicU64::new(0),
            new_entities: AtomicU64::new(0),
            results_written: AtomicU64::new(0),
            terms_enqueued: AtomicU64::new(0),
        }
    }

    /// Counts one finished dispatch and returns the new total
    pub fn record_dispatch(&self) -> u64 {
        self.dispatched.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_throttle(&self) {
        self.throttles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_records(&self, n: u64) {
        self.records.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_new_entity(&self) {
        self.new_entities.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_result_written(&self) {
        self.results_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueued(&self) {
        self.terms_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            elapsed: self.started.elapsed(),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            throttles: self.throttles.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
            new_entities: self.new_entities.load(Ordering::Relaxed),
            results_written: self.results_written.load(Ordering::Relaxed),
            terms_enqueued: self.terms_enqueued.load(Ordering::Relaxed),
        }
    }

    /// Logs a one-line progress report
    pub fn log_progress(&self, pending: usize) {
        let snapshot = self.snapshot();
        tracing::info!(
            "Progress: {} terms dispatched, {} pending, {} new entities, {} results, {:.2} terms/sec",
            snapshot.dispatched,
            pending,
            snapshot.new_entities,
            snapshot.results_written,
            snapshot.rate()
        );
    }
}

impl Default for CrawlProgress {
    fn default() -> Self {
        Self::new()
    }
}
