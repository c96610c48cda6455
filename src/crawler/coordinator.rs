//! Crawler coordinator - main crawl orchestration logic
//!
//! This module ties the crawl together:
//! - Recovering prior output and preparing the result sink
//! - Opening the optional run ledger
//! - Seeding the frontier and running the worker pool
//! - Joining, closing and cancelling the crawl

use crate::config::Config;
use crate::crawler::client::SearchClient;
use crate::crawler::expansion::{ExpansionReport, Expander};
use crate::crawler::fetcher::HttpSearchClient;
use crate::crawler::frontier::{Frontier, PushResult, QueuedTerm};
use crate::output::{CrawlProgress, ProgressSnapshot};
use crate::state::{BackoffPolicy, CrawlState};
use crate::storage::{
    load_existing, DispatchOutcome, DispatchRecord, FileSink, Ledger, PriorOutput, RunStatus,
    SqliteLedger, StorageError,
};
use crate::term::{DerivationRules, Term};
use crate::HarvestError;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Ledger handle bound to the current run
struct RunLedger {
    ledger: Mutex<SqliteLedger>,
    run_id: i64,
}

impl RunLedger {
    /// Opens the ledger and registers a new run
    fn open(path: &Path, config_hash: &str) -> Result<Self, HarvestError> {
        let mut ledger = SqliteLedger::new(path)?;

        if let Some(latest) = ledger.get_latest_run()? {
            if latest.status == RunStatus::Running {
                tracing::warn!(
                    "Run {} did not finish cleanly; marking it interrupted",
                    latest.id
                );
                ledger.finish_run(latest.id, RunStatus::Interrupted)?;
            }
            if latest.config_hash != config_hash {
                tracing::warn!(
                    "Configuration changed since run {} (hash {} -> {})",
                    latest.id,
                    latest.config_hash,
                    config_hash
                );
            }
        }

        let run_id = ledger.create_run(config_hash)?;
        tracing::info!("Recording run {} in ledger {}", run_id, path.display());

        Ok(Self {
            ledger: Mutex::new(ledger),
            run_id,
        })
    }

    fn dispatched_terms(&self) -> Result<Vec<String>, HarvestError> {
        let ledger = self
            .ledger
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(ledger.load_dispatched_terms()?)
    }

    /// Records one dispatch; failures are logged, never fatal
    fn record(&self, term: &Term, outcome: DispatchOutcome, report: &ExpansionReport) {
        let record = DispatchRecord {
            term: term.as_str().to_string(),
            outcome,
            records: report.records as u32,
            new_entities: report.new_entities as u32,
            throttles: report.cooldowns.len() as u32,
        };

        let result = match self.ledger.lock() {
            Ok(mut ledger) => ledger.record_dispatch(self.run_id, &record),
            Err(_) => Err(StorageError::LockPoisoned),
        };
        if let Err(e) = result {
            tracing::warn!("Failed to record dispatch of {:?}: {}", term.as_str(), e);
        }
    }

    fn finish(&self, status: RunStatus) {
        let result = match self.ledger.lock() {
            Ok(mut ledger) => ledger.finish_run(self.run_id, status),
            Err(_) => Err(StorageError::LockPoisoned),
        };
        if let Err(e) = result {
            tracing::warn!("Failed to finish run {}: {}", self.run_id, e);
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    state: Arc<CrawlState>,
    client: Arc<dyn SearchClient>,
    ledger: Option<Arc<RunLedger>>,
    progress: Arc<CrawlProgress>,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a coordinator that queries the configured HTTP endpoint
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Fingerprint of the configuration file, stored in the ledger
    /// * `fresh` - Truncate prior output instead of recovering from it
    pub fn new(config: Config, config_hash: &str, fresh: bool) -> Result<Self, HarvestError> {
        let client = HttpSearchClient::new(&config.search, &config.user_agent)?;
        Self::with_client(config, config_hash, fresh, Arc::new(client))
    }

    /// Creates a coordinator around any search client
    pub fn with_client(
        config: Config,
        config_hash: &str,
        fresh: bool,
        client: Arc<dyn SearchClient>,
    ) -> Result<Self, HarvestError> {
        let results_path = Path::new(&config.output.results_path);
        let domains_path = Path::new(&config.output.domains_path);

        let (sink, prior) = if fresh {
            tracing::info!(
                "Starting fresh: truncating {} and {}",
                results_path.display(),
                domains_path.display()
            );
            (
                FileSink::create_fresh(results_path, domains_path)?,
                PriorOutput::default(),
            )
        } else {
            let mut prior = load_existing(results_path, domains_path)?;
            let lines = std::mem::take(&mut prior.lines);
            (FileSink::open(results_path, domains_path, lines)?, prior)
        };

        let frontier = Frontier::new(config.crawler.max_terms, config.crawler.max_depth);
        let state = Arc::new(CrawlState::new(frontier, Arc::new(sink)));
        state.restore_entities(prior.entities);

        let ledger = match &config.output.ledger_path {
            Some(path) => Some(Arc::new(RunLedger::open(Path::new(path), config_hash)?)),
            None => None,
        };

        if config.seeds.restore_seen_terms && !fresh {
            if let Some(ledger) = &ledger {
                let terms: Vec<Term> = ledger
                    .dispatched_terms()?
                    .iter()
                    .filter_map(|t| Term::new(t))
                    .collect();
                tracing::info!("Restored {} seen terms from the ledger", terms.len());
                state.restore_terms(terms);
            }
        }

        Ok(Self {
            config: Arc::new(config),
            state,
            client,
            ledger,
            progress: Arc::new(CrawlProgress::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Token that stops the crawl when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> &Arc<CrawlState> {
        &self.state
    }

    pub fn progress(&self) -> &CrawlProgress {
        &self.progress
    }

    /// Runs the crawl until the frontier drains or the token is cancelled
    ///
    /// 1. Pushes every seed at depth 0
    /// 2. Spawns the configured number of workers
    /// 3. Waits for the frontier to be joined, or for cancellation
    /// 4. Closes the frontier and waits for every worker to exit
    /// 5. Retries results whose append failed; any still missing fail the run
    /// 6. Marks the run completed, interrupted or failed in the ledger
    pub async fn run(&self, seeds: Vec<Term>) -> Result<ProgressSnapshot, HarvestError> {
        let mut seeded = 0;
        for term in seeds {
            if self.state.enqueue(term, 0) == PushResult::Queued {
                seeded += 1;
            }
        }

        let crawler = &self.config.crawler;
        tracing::info!(
            "Starting crawl: {} seed terms, {} workers, {} known entities",
            seeded,
            crawler.workers,
            self.state.seen_entity_count()
        );

        let expander = Arc::new(Expander::new(
            Arc::clone(&self.client),
            Arc::clone(&self.state),
            DerivationRules::from(crawler),
            BackoffPolicy::from(crawler),
            self.cancel.clone(),
            Arc::clone(&self.progress),
        ));

        let mut handles = Vec::with_capacity(crawler.workers as usize);
        for id in 0..crawler.workers as usize {
            let worker = Worker {
                id,
                state: Arc::clone(&self.state),
                expander: Arc::clone(&expander),
                ledger: self.ledger.clone(),
                progress: Arc::clone(&self.progress),
                delay: crawler.delay_between_terms(),
                progress_interval: crawler.progress_interval.max(1),
            };
            handles.push(tokio::spawn(worker.run()));
        }

        let drained = tokio::select! {
            _ = self.state.frontier().join() => true,
            _ = self.cancel.cancelled() => false,
        };

        if drained {
            tracing::info!("Frontier drained, stopping workers");
        } else {
            tracing::info!("Cancellation requested; waiting for in-flight terms");
        }
        self.state.frontier().close();

        let mut failure = None;
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker task failed: {}", e);
                failure.get_or_insert(e);
            }
        }

        for _ in 0..self.state.retry_unpersisted() {
            self.progress.record_result_written();
        }
        let lost = self.state.unpersisted();
        for entry in &lost {
            tracing::error!("Result never persisted: {}", entry);
        }

        let status = match (&failure, drained) {
            (Some(_), _) => RunStatus::Failed,
            (None, _) if !lost.is_empty() => RunStatus::Failed,
            (None, true) => RunStatus::Completed,
            (None, false) => RunStatus::Interrupted,
        };
        if let Some(ledger) = &self.ledger {
            ledger.finish(status);
        }

        if let Some(e) = failure {
            return Err(e.into());
        }
        if !lost.is_empty() {
            return Err(HarvestError::Unpersisted(lost.len()));
        }

        let snapshot = self.progress.snapshot();
        tracing::info!(
            "Crawl {}: {} terms dispatched, {} new entities, {} results written in {:?}",
            status.to_db_string(),
            snapshot.dispatched,
            snapshot.new_entities,
            snapshot.results_written,
            snapshot.elapsed
        );

        Ok(snapshot)
    }
}

/// One member of the worker pool
struct Worker {
    id: usize,
    state: Arc<CrawlState>,
    expander: Arc<Expander>,
    ledger: Option<Arc<RunLedger>>,
    progress: Arc<CrawlProgress>,
    delay: Duration,
    progress_interval: u64,
}

impl Worker {
    async fn run(self) {
        let frontier = self.state.frontier();
        tracing::debug!("Worker {} started", self.id);

        while let Some(item) = frontier.pop().await {
            let report = self.expander.expand(&item).await;
            let dispatched = self.account(&item, &report);
            frontier.task_done();

            if dispatched && !self.delay.is_zero() {
                tokio::select! {
                    _ = frontier.wait_closed() => {}
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }
        }

        tracing::debug!("Worker {} exiting", self.id);
    }

    /// Updates counters and the ledger; false when nothing was dispatched
    fn account(&self, item: &QueuedTerm, report: &ExpansionReport) -> bool {
        let Some(outcome) = report.outcome.dispatch_outcome() else {
            return false;
        };

        let total = self.progress.record_dispatch();
        match outcome {
            DispatchOutcome::Success => self.progress.record_success(),
            DispatchOutcome::Failed => self.progress.record_failure(),
            DispatchOutcome::Abandoned => self.progress.record_abandoned(),
        }
        self.progress.add_records(report.records as u64);

        if total % self.progress_interval == 0 {
            self.progress
                .log_progress(self.state.frontier().outstanding());
        }

        if let Some(ledger) = &self.ledger {
            ledger.record(&item.term, outcome, report);
        }
        true
    }
}

/// Runs a complete crawl against the configured search endpoint
///
/// Seeds are collected from every configured source, Ctrl-C cancels the
/// crawl gracefully, and the final counters are returned.
///
/// # Example
///
/// ```no_run
/// use term_harvest::config::load_config_with_hash;
/// use term_harvest::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("harvest.toml"))?;
/// let summary = run_crawl(config, &hash, false).await?;
/// println!("{} results written", summary.results_written);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    config_hash: &str,
    fresh: bool,
) -> Result<ProgressSnapshot, HarvestError> {
    let seed_client = crate::crawler::build_http_client(
        &config.user_agent,
        Duration::from_secs(config.search.timeout_secs),
    )?;
    let seeds = crate::seeds::collect_seeds(&config.seeds, &seed_client).await;

    let coordinator = Coordinator::new(config, config_hash, fresh)?;

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, shutting down after in-flight terms");
            cancel.cancel();
        }
    });

    coordinator.run(seeds).await
}
