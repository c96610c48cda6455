//! Statistics generation from the run ledger
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the ledger and the results file.

use crate::output::ProgressSnapshot;
use crate::storage::{DispatchOutcome, Ledger, PriorOutput, RunRecord};
use crate::HarvestError;
use std::collections::HashMap;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Number of runs recorded
    pub total_runs: u64,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Number of distinct terms ever dispatched
    pub distinct_terms: u64,

    /// Dispatch count by outcome
    pub dispatches_by_outcome: HashMap<DispatchOutcome, u64>,

    /// Records returned across all dispatches
    pub total_records: u64,

    /// Entities first seen across all dispatches
    pub total_new_entities: u64,

    /// Throttle signals handled across all dispatches
    pub total_throttles: u64,

    /// `domain--entity` lines currently in the results file
    pub result_lines: usize,

    /// Distinct entities currently in the results file
    pub result_entities: usize,

    /// Distinct domains currently in the results file
    pub result_domains: usize,
}

/// Loads statistics from the ledger and the recovered results file
///
/// # Arguments
///
/// * `ledger` - The ledger to query
/// * `results` - State recovered from the results file
pub fn load_statistics(
    ledger: &dyn Ledger,
    results: &PriorOutput,
) -> Result<CrawlStatistics, HarvestError> {
    let (total_records, total_new_entities, total_throttles) = ledger.sum_dispatch_totals()?;

    Ok(CrawlStatistics {
        total_runs: ledger.count_runs()?,
        latest_run: ledger.get_latest_run()?,
        distinct_terms: ledger.count_distinct_terms()?,
        dispatches_by_outcome: ledger.count_by_outcome()?,
        total_records,
        total_new_entities,
        total_throttles,
        result_lines: results.results.len(),
        result_entities: results.entities.len(),
        result_domains: results.domains.len(),
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Runs:");
    println!("  Total runs: {}", stats.total_runs);
    if let Some(run) = &stats.latest_run {
        println!(
            "  Latest run: #{} {} (started {}, finished {})",
            run.id,
            run.status.to_db_string(),
            run.started_at,
            run.finished_at.as_deref().unwrap_or("-")
        );
    }
    println!();

    let total_dispatches: u64 = stats.dispatches_by_outcome.values().sum();
    println!("Dispatches:");
    println!("  Total dispatches: {}", total_dispatches);
    println!("  Distinct terms: {}", stats.distinct_terms);
    for outcome in [
        DispatchOutcome::Success,
        DispatchOutcome::Failed,
        DispatchOutcome::Abandoned,
    ] {
        let count = stats
            .dispatches_by_outcome
            .get(&outcome)
            .copied()
            .unwrap_or(0);
        let percentage = if total_dispatches > 0 {
            (count as f64 / total_dispatches as f64) * 100.0
        } else {
            0.0
        };
        println!("  {:?}: {} ({:.1}%)", outcome, count, percentage);
    }
    println!("  Records returned: {}", stats.total_records);
    println!("  New entities: {}", stats.total_new_entities);
    println!("  Throttle signals: {}", stats.total_throttles);
    println!();

    println!("Results File:");
    println!("  Lines: {}", stats.result_lines);
    println!("  Entities: {}", stats.result_entities);
    println!("  Domains: {}", stats.result_domains);
}

/// Prints the end-of-crawl summary
pub fn print_summary(summary: &ProgressSnapshot) {
    println!("=== Crawl Summary ===\n");
    println!("  Duration: {:.1}s", summary.elapsed.as_secs_f64());
    println!(
        "  Terms dispatched: {} ({:.2}/sec)",
        summary.dispatched,
        summary.rate()
    );
    println!("  Succeeded: {}", summary.succeeded);
    println!("  Failed: {}", summary.failed);
    println!("  Abandoned: {}", summary.abandoned);
    println!("  Throttle signals: {}", summary.throttles);
    println!("  Records returned: {}", summary.records);
    println!("  New entities: {}", summary.new_entities);
    println!("  Results written: {}", summary.results_written);
    println!("  Terms enqueued: {}", summary.terms_enqueued);
}
