//! Frontier queue of pending search terms
//!
//! This module handles:
//! - FIFO hand-off of terms between concurrent producers and consumers
//! - Work-counter join semantics: `join` waits until every pushed term has
//!   been popped *and* marked done, including terms pushed while processing
//! - Closing, after which every `pop` returns `None`
//! - The optional total-term and depth caps

use crate::term::Term;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio_util::sync::CancellationToken;

/// A term waiting to be dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTerm {
    /// The term to search for
    pub term: Term,

    /// Derivation depth (seeds are 0)
    pub depth: u32,
}

impl QueuedTerm {
    pub fn seed(term: Term) -> Self {
        Self { term, depth: 0 }
    }
}

/// Result of a push attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    /// The term is now pending
    Queued,
    /// The term was already seen or already pending
    Duplicate,
    /// The term is deeper than the configured depth cap
    DepthExceeded,
    /// The total-term cap has been reached
    CapReached,
    /// The frontier is closed
    Closed,
}

/// Concurrent FIFO with join and close
pub struct Frontier {
    tx: mpsc::UnboundedSender<QueuedTerm>,
    rx: Mutex<mpsc::UnboundedReceiver<QueuedTerm>>,

    /// Pushed but not yet marked done
    outstanding: AtomicUsize,

    /// Total terms ever accepted
    accepted: AtomicU64,

    max_terms: Option<u64>,
    max_depth: Option<u32>,
    cap_logged: AtomicBool,

    idle: Notify,
    closed: CancellationToken,
}

impl Frontier {
    /// Creates an empty frontier with optional caps
    pub fn new(max_terms: Option<u64>, max_depth: Option<u32>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            outstanding: AtomicUsize::new(0),
            accepted: AtomicU64::new(0),
            max_terms,
            max_depth,
            cap_logged: AtomicBool::new(false),
            idle: Notify::new(),
            closed: CancellationToken::new(),
        }
    }

    /// Whether a term at `depth` would be rejected by the depth cap
    pub fn exceeds_depth(&self, depth: u32) -> bool {
        matches!(self.max_depth, Some(max) if depth > max)
    }

    /// Adds a term to the back of the queue
    ///
    /// De-duplication is the caller's job; this only applies the caps.
    pub fn push(&self, item: QueuedTerm) -> PushResult {
        if self.closed.is_cancelled() {
            return PushResult::Closed;
        }
        if self.exceeds_depth(item.depth) {
            return PushResult::DepthExceeded;
        }
        if !self.reserve_slot() {
            if !self.cap_logged.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    "Term cap of {} reached; further terms are dropped",
                    self.max_terms.unwrap_or_default()
                );
            }
            return PushResult::CapReached;
        }

        // Count before sending so a concurrent join never sees a false zero
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(item).is_err() {
            self.task_done();
            return PushResult::Closed;
        }
        PushResult::Queued
    }

    fn reserve_slot(&self) -> bool {
        match self.max_terms {
            Some(max) => self
                .accepted
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    (n < max).then_some(n + 1)
                })
                .is_ok(),
            None => {
                self.accepted.fetch_add(1, Ordering::SeqCst);
                true
            }
        }
    }

    /// Takes the next term, waiting while the queue is empty
    ///
    /// Returns `None` once the frontier is closed.
    pub async fn pop(&self) -> Option<QueuedTerm> {
        let mut rx = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return None,
            rx = self.rx.lock() => rx,
        };

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => None,
            item = rx.recv() => item,
        }
    }

    /// Marks one popped term as fully processed
    pub fn task_done(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Waits until every pushed term has been processed
    pub async fn join(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.outstanding.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Closes the frontier; pending and future pops return `None`
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the frontier is closed
    pub async fn wait_closed(&self) {
        self.closed.cancelled().await
    }

    /// Terms pushed but not yet marked done
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Total terms accepted over the frontier's lifetime
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::SeqCst)
    }
}
