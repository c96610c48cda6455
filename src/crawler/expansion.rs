//! Per-term expansion
//!
//! One call to [`Expander::expand`] handles one dequeued term from start to
//! finish:
//! 1. Claim the term in the seen-terms set (no-op if already claimed)
//! 2. Query the search client, retrying throttles through a fresh
//!    [`BackoffController`]
//! 3. For every record whose entity is new: persist one result per domain
//!    and enqueue the terms derived from the entity name

use crate::crawler::client::{Record, SearchClient, SearchOutcome};
use crate::crawler::frontier::{PushResult, QueuedTerm};
use crate::output::CrawlProgress;
use crate::state::{BackoffController, BackoffDecision, BackoffPolicy, CrawlState};
use crate::storage::{clean_field, DispatchOutcome, ResultEntry};
use crate::term::{derive_terms, DerivationRules};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How an expansion ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionOutcome {
    /// The term had already been claimed; nothing was dispatched
    AlreadySeen,
    /// The search answered and its records were processed
    Completed,
    /// Hard failure; the term was dropped
    Failed(String),
    /// Retry ceiling reached or cancelled during a cooldown
    Abandoned,
}

impl ExpansionOutcome {
    /// The ledger outcome, or `None` when nothing was dispatched
    pub fn dispatch_outcome(&self) -> Option<DispatchOutcome> {
        match self {
            Self::AlreadySeen => None,
            Self::Completed => Some(DispatchOutcome::Success),
            Self::Failed(_) => Some(DispatchOutcome::Failed),
            Self::Abandoned => Some(DispatchOutcome::Abandoned),
        }
    }
}

/// What one expansion did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionReport {
    pub outcome: ExpansionOutcome,
    /// Cooldowns slept, in order
    pub cooldowns: Vec<Duration>,
    /// Records returned by the successful search
    pub records: usize,
    /// Records whose entity was new
    pub new_entities: usize,
    /// Result lines written
    pub results_written: usize,
    /// Derived terms accepted by the frontier
    pub terms_enqueued: usize,
}

impl ExpansionReport {
    fn new(outcome: ExpansionOutcome) -> Self {
        Self {
            outcome,
            cooldowns: Vec::new(),
            records: 0,
            new_entities: 0,
            results_written: 0,
            terms_enqueued: 0,
        }
    }
}

/// Runs the expansion algorithm against shared crawl state
pub struct Expander {
    client: Arc<dyn SearchClient>,
    state: Arc<CrawlState>,
    rules: DerivationRules,
    backoff: BackoffPolicy,
    cancel: CancellationToken,
    progress: Arc<CrawlProgress>,
}

impl Expander {
    pub fn new(
        client: Arc<dyn SearchClient>,
        state: Arc<CrawlState>,
        rules: DerivationRules,
        backoff: BackoffPolicy,
        cancel: CancellationToken,
        progress: Arc<CrawlProgress>,
    ) -> Self {
        Self {
            client,
            state,
            rules,
            backoff,
            cancel,
            progress,
        }
    }

    /// Expands one queued term
    pub async fn expand(&self, item: &QueuedTerm) -> ExpansionReport {
        let term = &item.term;
        if !self.state.claim_term(term) {
            tracing::debug!("Skipping already dispatched term {:?}", term.as_str());
            return ExpansionReport::new(ExpansionOutcome::AlreadySeen);
        }

        tracing::debug!("Dispatching {:?} (depth {})", term.as_str(), item.depth);

        let mut cooldowns = Vec::new();
        let mut backoff = BackoffController::new(self.backoff);

        let records = loop {
            match self.client.search(term).await {
                SearchOutcome::Success(records) => break records,
                SearchOutcome::Failure(reason) => {
                    tracing::error!("Search for {:?} failed: {}", term.as_str(), reason);
                    let mut report = ExpansionReport::new(ExpansionOutcome::Failed(reason));
                    report.cooldowns = cooldowns;
                    return report;
                }
                throttle => {
                    self.progress.record_throttle();
                    let signal = match &throttle {
                        SearchOutcome::Transient(reason) => reason.as_str(),
                        _ => "rate limited",
                    };

                    match backoff.on_throttle() {
                        BackoffDecision::Retry(cooldown) => {
                            tracing::warn!(
                                "Search for {:?} throttled ({}), sleeping {}s (retry {})",
                                term.as_str(),
                                signal,
                                cooldown.as_secs(),
                                backoff.retries()
                            );
                            cooldowns.push(cooldown);
                            if !self.cooldown(cooldown).await {
                                tracing::info!(
                                    "Cancelled while cooling down; abandoning {:?}",
                                    term.as_str()
                                );
                                let mut report = ExpansionReport::new(ExpansionOutcome::Abandoned);
                                report.cooldowns = cooldowns;
                                return report;
                            }
                        }
                        BackoffDecision::GiveUp => {
                            tracing::warn!(
                                "Giving up on {:?} after {} retries",
                                term.as_str(),
                                backoff.retries()
                            );
                            let mut report = ExpansionReport::new(ExpansionOutcome::Abandoned);
                            report.cooldowns = cooldowns;
                            return report;
                        }
                    }
                }
            }
        };

        let mut report = ExpansionReport::new(ExpansionOutcome::Completed);
        report.cooldowns = cooldowns;
        report.records = records.len();

        let recovered = self.state.retry_unpersisted();
        for _ in 0..recovered {
            self.progress.record_result_written();
        }
        report.results_written += recovered;

        for record in &records {
            self.absorb(record, item.depth, &mut report);
        }

        report
    }

    /// Sleeps for `duration`; false if cancelled first
    async fn cooldown(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    fn absorb(&self, record: &Record, depth: u32, report: &mut ExpansionReport) {
        let entity_name = clean_field(&record.entity_name);
        if entity_name.is_empty() {
            tracing::debug!("Skipping record without a name");
            return;
        }
        if !self.state.claim_entity(&entity_name) {
            return;
        }
        report.new_entities += 1;
        self.progress.record_new_entity();

        for domain in &record.domains {
            let entry = ResultEntry::new(domain, &entity_name);
            if entry.domain.is_empty() {
                continue;
            }
            match self.state.record_result(&entry) {
                Ok(true) => {
                    tracing::info!("{}", entry);
                    report.results_written += 1;
                    self.progress.record_result_written();
                }
                Ok(false) => {}
                Err(e) => tracing::error!("Failed to persist {} (will retry): {}", entry, e),
            }
        }

        for term in derive_terms(&entity_name, &self.rules) {
            if self.state.enqueue(term, depth + 1) == PushResult::Queued {
                report.terms_enqueued += 1;
                self.progress.record_enqueued();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::Frontier;
    use crate::storage::{ResultSink, StorageError, StorageResult};
    use crate::term::Term;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays scripted outcomes per term and counts calls
    #[derive(Default)]
    struct ScriptedClient {
        scripts: Mutex<HashMap<String, VecDeque<SearchOutcome>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn with(self, term: &str, outcomes: Vec<SearchOutcome>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(term.to_string(), outcomes.into());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchClient for ScriptedClient {
        async fn search(&self, term: &Term) -> SearchOutcome {
            self.calls.lock().unwrap().push(term.as_str().to_string());
            self.scripts
                .lock()
                .unwrap()
                .get_mut(term.as_str())
                .and_then(|q| q.pop_front())
                .unwrap_or(SearchOutcome::Success(Vec::new()))
        }
    }

    #[derive(Default)]
    struct MemorySink {
        lines: Mutex<Vec<String>>,
        /// Number of upcoming appends that fail
        failures: AtomicUsize,
    }

    impl MemorySink {
        fn failing(times: usize) -> Self {
            Self {
                failures: AtomicUsize::new(times),
                ..Default::default()
            }
        }
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
            let mut lines = self.lines.lock().unwrap();
            let line = entry.to_line();
            if lines.contains(&line) {
                return Ok(false);
            }
            lines.push(line);
            Ok(true)
        }

        fn known_entries(&self) -> usize {
            self.lines.lock().unwrap().len()
        }
    }

    struct Harness {
        client: Arc<ScriptedClient>,
        sink: Arc<MemorySink>,
        state: Arc<CrawlState>,
        expander: Expander,
        cancel: CancellationToken,
    }

    fn harness(client: ScriptedClient, sink: MemorySink, max_retries: Option<u32>) -> Harness {
        let client = Arc::new(client);
        let sink = Arc::new(sink);
        let state = Arc::new(CrawlState::new(
            Frontier::new(None, None),
            Arc::clone(&sink) as Arc<dyn ResultSink>,
        ));
        let cancel = CancellationToken::new();
        let policy = BackoffPolicy {
            long_cooldown: Duration::from_secs(4200),
            short_cooldown: Duration::from_secs(300),
            max_retries,
        };
        let expander = Expander::new(
            Arc::clone(&client) as Arc<dyn SearchClient>,
            Arc::clone(&state),
            DerivationRules::default(),
            policy,
            cancel.clone(),
            Arc::new(CrawlProgress::new()),
        );
        Harness {
            client,
            sink,
            state,
            expander,
            cancel,
        }
    }

    fn seed(term: &str) -> QueuedTerm {
        QueuedTerm::seed(Term::new(term).unwrap())
    }

    async fn drain(state: &CrawlState) -> Vec<String> {
        let mut terms = Vec::new();
        while state.frontier().outstanding() > 0 {
            let item = state.frontier().pop().await.unwrap();
            state.frontier().task_done();
            terms.push(item.term.into_string());
        }
        terms
    }

    #[tokio::test]
    async fn test_acme_college_scenario() {
        let client = ScriptedClient::default().with(
            "college",
            vec![SearchOutcome::Success(vec![Record::new(
                "Acme College",
                vec!["acme.edu"],
            )])],
        );
        let h = harness(client, MemorySink::default(), None);

        let report = h.expander.expand(&seed("college")).await;

        assert_eq!(report.outcome, ExpansionOutcome::Completed);
        assert_eq!(report.new_entities, 1);
        assert_eq!(report.results_written, 1);
        assert_eq!(*h.sink.lines.lock().unwrap(), vec!["acme.edu--Acme College"]);
        assert_eq!(drain(&h.state).await, vec!["acme"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_twice_then_success() {
        let client = ScriptedClient::default().with(
            "x",
            vec![
                SearchOutcome::RateLimited,
                SearchOutcome::RateLimited,
                SearchOutcome::Success(Vec::new()),
            ],
        );
        let h = harness(client, MemorySink::default(), None);

        let started = tokio::time::Instant::now();
        let report = h.expander.expand(&seed("x")).await;

        assert_eq!(report.outcome, ExpansionOutcome::Completed);
        assert_eq!(
            report.cooldowns,
            vec![Duration::from_secs(4200), Duration::from_secs(300)]
        );
        assert!(started.elapsed() >= Duration::from_secs(4500));
        assert_eq!(h.client.calls(), vec!["x", "x", "x"]);
        assert!(h.sink.lines.lock().unwrap().is_empty());
        assert_eq!(h.state.frontier().outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_use_same_escalation() {
        let client = ScriptedClient::default().with(
            "x",
            vec![
                SearchOutcome::Transient("Request timeout".to_string()),
                SearchOutcome::RateLimited,
                SearchOutcome::Transient("Connection refused".to_string()),
                SearchOutcome::Success(Vec::new()),
            ],
        );
        let h = harness(client, MemorySink::default(), None);

        let report = h.expander.expand(&seed("x")).await;
        assert_eq!(
            report.cooldowns,
            vec![
                Duration::from_secs(4200),
                Duration::from_secs(300),
                Duration::from_secs(300)
            ]
        );
        assert_eq!(report.outcome, ExpansionOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_ceiling_abandons_term() {
        let client = ScriptedClient::default().with(
            "x",
            vec![SearchOutcome::RateLimited, SearchOutcome::RateLimited],
        );
        let h = harness(client, MemorySink::default(), Some(1));

        let report = h.expander.expand(&seed("x")).await;
        assert_eq!(report.outcome, ExpansionOutcome::Abandoned);
        assert_eq!(report.cooldowns, vec![Duration::from_secs(4200)]);
        assert_eq!(h.client.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_cooldown_abandons_term() {
        let client = ScriptedClient::default().with("x", vec![SearchOutcome::RateLimited]);
        let h = harness(client, MemorySink::default(), None);
        h.cancel.cancel();

        let report = h.expander.expand(&seed("x")).await;
        assert_eq!(report.outcome, ExpansionOutcome::Abandoned);
        assert_eq!(h.client.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_hard_failure_drops_term() {
        let client = ScriptedClient::default()
            .with("x", vec![SearchOutcome::Failure("HTTP 500".to_string())]);
        let h = harness(client, MemorySink::default(), None);

        let report = h.expander.expand(&seed("x")).await;
        assert_eq!(
            report.outcome,
            ExpansionOutcome::Failed("HTTP 500".to_string())
        );
        assert_eq!(h.client.calls().len(), 1);
        assert_eq!(h.state.frontier().outstanding(), 0);
    }

    #[tokio::test]
    async fn test_term_dispatched_at_most_once() {
        let h = harness(ScriptedClient::default(), MemorySink::default(), None);

        let first = h.expander.expand(&seed("college")).await;
        let second = h.expander.expand(&seed("college")).await;

        assert_eq!(first.outcome, ExpansionOutcome::Completed);
        assert_eq!(second.outcome, ExpansionOutcome::AlreadySeen);
        assert_eq!(h.client.calls(), vec!["college"]);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_dispatch() {
        let h = Arc::new(harness(
            ScriptedClient::default(),
            MemorySink::default(),
            None,
        ));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let h = Arc::clone(&h);
                tokio::spawn(async move { h.expander.expand(&seed("college")).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(h.client.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_domains_still_derive_terms() {
        let client = ScriptedClient::default().with(
            "x",
            vec![SearchOutcome::Success(vec![Record::without_domains(
                "Riverside Academy",
            )])],
        );
        let h = harness(client, MemorySink::default(), None);

        let report = h.expander.expand(&seed("x")).await;
        assert_eq!(report.results_written, 0);
        assert!(h.sink.lines.lock().unwrap().is_empty());
        assert_eq!(drain(&h.state).await, vec!["riverside", "academy"]);
    }

    #[tokio::test]
    async fn test_known_entity_skipped_entirely() {
        let client = ScriptedClient::default().with(
            "x",
            vec![SearchOutcome::Success(vec![Record::new(
                "Acme College",
                vec!["acme.edu", "mail.acme.edu"],
            )])],
        );
        let h = harness(client, MemorySink::default(), None);
        h.state.restore_entities(vec!["Acme College".to_string()]);

        let report = h.expander.expand(&seed("x")).await;
        assert_eq!(report.records, 1);
        assert_eq!(report.new_entities, 0);
        assert!(h.sink.lines.lock().unwrap().is_empty());
        assert_eq!(h.state.frontier().outstanding(), 0);
    }

    #[tokio::test]
    async fn test_short_and_long_tokens_not_enqueued() {
        let client = ScriptedClient::default().with(
            "x",
            vec![SearchOutcome::Success(vec![Record::without_domains(
                "A B Institute of X",
            )])],
        );
        let h = harness(client, MemorySink::default(), None);

        h.expander.expand(&seed("x")).await;
        assert_eq!(drain(&h.state).await, vec!["institute"]);
    }

    #[tokio::test]
    async fn test_same_domain_under_two_entities() {
        let client = ScriptedClient::default().with(
            "x",
            vec![SearchOutcome::Success(vec![
                Record::new("North Campus", vec!["shared.edu"]),
                Record::new("South Campus", vec!["shared.edu"]),
            ])],
        );
        let h = harness(client, MemorySink::default(), None);

        let report = h.expander.expand(&seed("x")).await;
        assert_eq!(report.results_written, 2);
        assert_eq!(
            *h.sink.lines.lock().unwrap(),
            vec!["shared.edu--North Campus", "shared.edu--South Campus"]
        );
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_stop_expansion() {
        let client = ScriptedClient::default().with(
            "x",
            vec![SearchOutcome::Success(vec![Record::new(
                "Acme College",
                vec!["acme.edu"],
            )])],
        );
        let h = harness(client, MemorySink::failing(usize::MAX), None);

        let report = h.expander.expand(&seed("x")).await;
        assert_eq!(report.outcome, ExpansionOutcome::Completed);
        assert_eq!(report.results_written, 0);
        assert_eq!(report.terms_enqueued, 2);
        assert_eq!(
            h.state.unpersisted(),
            vec![ResultEntry::new("acme.edu", "Acme College")]
        );
    }

    #[tokio::test]
    async fn test_failed_result_written_by_next_expansion() {
        let client = ScriptedClient::default()
            .with(
                "college",
                vec![SearchOutcome::Success(vec![Record::new(
                    "Acme College",
                    vec!["acme.edu", "mail.acme.edu"],
                )])],
            )
            .with(
                "acme",
                vec![SearchOutcome::Success(vec![Record::new(
                    "Acme College",
                    vec!["acme.edu", "mail.acme.edu"],
                )])],
            );
        let h = harness(client, MemorySink::failing(1), None);

        let first = h.expander.expand(&seed("college")).await;
        assert_eq!(first.results_written, 1);
        assert_eq!(*h.sink.lines.lock().unwrap(), vec!["mail.acme.edu--Acme College"]);

        // The entity is already claimed, so only the held entry can write it
        let second = h.expander.expand(&seed("acme")).await;
        assert_eq!(second.new_entities, 0);
        assert_eq!(second.results_written, 1);
        assert_eq!(
            *h.sink.lines.lock().unwrap(),
            vec!["mail.acme.edu--Acme College", "acme.edu--Acme College"]
        );
        assert!(h.state.unpersisted().is_empty());
    }

    #[tokio::test]
    async fn test_entity_names_are_cleaned_before_claiming() {
        let client = ScriptedClient::default().with(
            "x",
            vec![SearchOutcome::Success(vec![
                Record::new("Gamma School ", vec!["gamma.edu"]),
                Record::new("Gamma\nSchool", vec!["gamma.edu"]),
                Record::new("   ", vec!["blank.edu"]),
            ])],
        );
        let h = harness(client, MemorySink::default(), None);

        let report = h.expander.expand(&seed("x")).await;
        assert_eq!(report.new_entities, 1);
        assert!(h.state.is_entity_seen("Gamma School"));
        assert_eq!(*h.sink.lines.lock().unwrap(), vec!["gamma.edu--Gamma School"]);
    }
}
