use crate::crawler::{Frontier, PushResult, QueuedTerm};
use crate::state::SeenSet;
use crate::storage::{ResultEntry, ResultSink, StorageResult};
use crate::term::Term;
use std::sync::{Arc, Mutex};

/// Shared state of one crawl
///
/// Every field is safe for concurrent use; workers hold the whole struct
/// behind an `Arc`.
pub struct CrawlState {
    /// Terms already dispatched (or being dispatched)
    seen_terms: SeenSet<Term>,

    /// Entity names whose record has already been expanded
    seen_entities: SeenSet<String>,

    /// Terms ever offered to the frontier
    queued: SeenSet<Term>,

    frontier: Frontier,
    sink: Arc<dyn ResultSink>,

    /// Entries whose append failed, awaiting another attempt
    unpersisted: Mutex<Vec<ResultEntry>>,
}

impl CrawlState {
    pub fn new(frontier: Frontier, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            seen_terms: SeenSet::new(),
            seen_entities: SeenSet::new(),
            queued: SeenSet::new(),
            frontier,
            sink,
            unpersisted: Mutex::new(Vec::new()),
        }
    }

    /// Pre-populates seen entities from prior output
    pub fn restore_entities<I: IntoIterator<Item = String>>(&self, entities: I) {
        self.seen_entities.preload(entities);
    }

    /// Pre-populates seen terms, e.g. from the ledger of earlier runs
    pub fn restore_terms<I: IntoIterator<Item = Term>>(&self, terms: I) {
        self.seen_terms.preload(terms);
    }

    /// Claims `term` for dispatch; false if someone already did
    pub fn claim_term(&self, term: &Term) -> bool {
        self.seen_terms.mark_if_new(term.clone())
    }

    /// Claims `entity_name` for expansion; false if already expanded
    pub fn claim_entity(&self, entity_name: &str) -> bool {
        self.seen_entities.mark_if_new(entity_name.to_string())
    }

    pub fn is_term_seen(&self, term: &Term) -> bool {
        self.seen_terms.contains(term)
    }

    pub fn is_entity_seen(&self, entity_name: &str) -> bool {
        self.seen_entities.contains(entity_name)
    }

    /// Offers a term to the frontier unless it was seen or queued before
    pub fn enqueue(&self, term: Term, depth: u32) -> PushResult {
        if self.seen_terms.contains(&term) {
            return PushResult::Duplicate;
        }
        if self.frontier.exceeds_depth(depth) {
            return PushResult::DepthExceeded;
        }
        if !self.queued.mark_if_new(term.clone()) {
            return PushResult::Duplicate;
        }
        self.frontier.push(QueuedTerm { term, depth })
    }

    /// Persists one pair; true when it was new and is now durable
    ///
    /// A failed append is kept for [`CrawlState::retry_unpersisted`], since
    /// the entity it belongs to is already claimed and will not be expanded
    /// again.
    pub fn record_result(&self, entry: &ResultEntry) -> StorageResult<bool> {
        let result = self.sink.append_if_new(entry);
        if result.is_err() {
            self.hold(vec![entry.clone()]);
        }
        result
    }

    /// Retries every held entry; returns how many were written
    pub fn retry_unpersisted(&self) -> usize {
        let pending = match self.unpersisted.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => return 0,
        };
        if pending.is_empty() {
            return 0;
        }

        let mut written = 0;
        let mut failed = Vec::new();
        for entry in pending {
            match self.sink.append_if_new(&entry) {
                Ok(true) => {
                    tracing::info!("{} (persisted on retry)", entry);
                    written += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Retry of {} failed: {}", entry, e);
                    failed.push(entry);
                }
            }
        }
        self.hold(failed);
        written
    }

    /// Entries that are still not durable
    pub fn unpersisted(&self) -> Vec<ResultEntry> {
        self.unpersisted
            .lock()
            .map(|pending| pending.clone())
            .unwrap_or_default()
    }

    fn hold(&self, entries: Vec<ResultEntry>) {
        if entries.is_empty() {
            return;
        }
        match self.unpersisted.lock() {
            Ok(mut pending) => {
                for entry in entries {
                    if !pending.contains(&entry) {
                        pending.push(entry);
                    }
                }
            }
            Err(_) => tracing::error!("Retry list poisoned; {} entries lost", entries.len()),
        }
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn seen_term_count(&self) -> usize {
        self.seen_terms.len()
    }

    pub fn seen_entity_count(&self) -> usize {
        self.seen_entities.len()
    }

    pub fn known_results(&self) -> usize {
        self.sink.known_entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MemorySink {
        lines: Mutex<Vec<ResultEntry>>,
        /// Number of upcoming appends that fail
        failures: AtomicUsize,
    }

    impl ResultSink for MemorySink {
        fn append_if_new(&self, entry: &ResultEntry) -> StorageResult<bool> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StorageError::LockPoisoned);
            }
            let mut lines = self.lines.lock().map_err(|_| StorageError::LockPoisoned)?;
            if lines.contains(entry) {
                return Ok(false);
            }
            lines.push(entry.clone());
            Ok(true)
        }

        fn known_entries(&self) -> usize {
            self.lines.lock().unwrap().len()
        }
    }

    fn state() -> CrawlState {
        CrawlState::new(Frontier::new(None, Some(2)), Arc::new(MemorySink::default()))
    }

    fn term(s: &str) -> Term {
        Term::new(s).unwrap()
    }

    #[test]
    fn test_enqueue_skips_seen_and_queued() {
        let state = state();
        assert!(state.claim_term(&term("college")));

        assert_eq!(state.enqueue(term("college"), 1), PushResult::Duplicate);
        assert_eq!(state.enqueue(term("acme"), 1), PushResult::Queued);
        assert_eq!(state.enqueue(term("acme"), 1), PushResult::Duplicate);
        assert_eq!(state.frontier().outstanding(), 1);
    }

    #[test]
    fn test_depth_rejection_does_not_block_shallower_offer() {
        let state = state();
        assert_eq!(state.enqueue(term("deep"), 3), PushResult::DepthExceeded);
        assert_eq!(state.enqueue(term("deep"), 1), PushResult::Queued);
    }

    #[test]
    fn test_claims_are_exclusive() {
        let state = state();
        assert!(state.claim_entity("Acme College"));
        assert!(!state.claim_entity("Acme College"));
        assert!(state.is_entity_seen("Acme College"));

        state.restore_terms(vec![term("beta")]);
        assert!(!state.claim_term(&term("beta")));
        assert_eq!(state.seen_term_count(), 1);
    }

    #[test]
    fn test_record_result_deduplicates() {
        let state = state();
        let entry = ResultEntry::new("acme.edu", "Acme College");
        assert!(state.record_result(&entry).unwrap());
        assert!(!state.record_result(&entry).unwrap());
        assert_eq!(state.known_results(), 1);
    }

    #[test]
    fn test_failed_append_is_retried() {
        let sink = Arc::new(MemorySink::default());
        sink.failures.store(2, Ordering::SeqCst);
        let state = CrawlState::new(Frontier::new(None, None), sink.clone());
        let entry = ResultEntry::new("acme.edu", "Acme College");

        assert!(state.record_result(&entry).is_err());
        assert_eq!(state.unpersisted(), vec![entry.clone()]);

        // Second failure keeps it held, without duplicating it
        assert_eq!(state.retry_unpersisted(), 0);
        assert_eq!(state.unpersisted(), vec![entry.clone()]);

        assert_eq!(state.retry_unpersisted(), 1);
        assert!(state.unpersisted().is_empty());
        assert_eq!(*sink.lines.lock().unwrap(), vec![entry]);
        assert_eq!(state.retry_unpersisted(), 0);
    }
}
