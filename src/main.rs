//! Term-Harvest main entry point
//!
//! This is the command-line interface for the Term-Harvest keyword crawler.

use clap::Parser;
use std::path::{Path, PathBuf};
use term_harvest::config::{load_config_with_hash, Config};
use term_harvest::crawler::{format_user_agent, run_crawl};
use term_harvest::output::{load_statistics, print_statistics, print_summary};
use term_harvest::storage::{load_existing, SqliteLedger};
use tracing_subscriber::EnvFilter;

/// Term-Harvest: a keyword-expanding discovery crawler
///
/// Term-Harvest queries a rate-limited search endpoint, records every
/// `domain--entity` pair it discovers, and derives new search terms from
/// each newly discovered entity until nothing new turns up.
#[derive(Parser, Debug)]
#[command(name = "term-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A keyword-expanding discovery crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Truncate previous results instead of resuming from them
    #[arg(long)]
    fresh: bool,

    /// Validate config and show the crawl plan without querying
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the ledger and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, &config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("term_harvest=info,warn"),
            1 => EnvFilter::new("term_harvest=debug,info"),
            2 => EnvFilter::new("term_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the crawl plan
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Term-Harvest Dry Run ===\n");

    let crawler = &config.crawler;
    println!("Crawler Configuration:");
    println!("  Workers: {}", crawler.workers);
    println!(
        "  Cooldowns: {}s first, {}s repeat",
        crawler.long_cooldown_secs, crawler.short_cooldown_secs
    );
    match crawler.max_retries {
        Some(max) => println!("  Max retries per term: {}", max),
        None => println!("  Max retries per term: unbounded"),
    }
    println!("  Delay between terms: {}ms", crawler.delay_between_terms_ms);
    println!(
        "  Derived term length: ({}, {}) exclusive, up to {} words",
        crawler.min_term_len, crawler.max_term_len, crawler.max_phrase_words
    );
    if let Some(max) = crawler.max_terms {
        println!("  Max terms: {}", max);
    }
    if let Some(max) = crawler.max_depth {
        println!("  Max depth: {}", max);
    }

    println!("\nSearch:");
    println!("  Endpoint: {}", config.search.endpoint);
    println!("  Query parameter: {}", config.search.query_param);
    println!("  User agent: {}", format_user_agent(&config.user_agent));

    println!("\nOutput:");
    println!("  Results: {}", config.output.results_path);
    println!("  Domains: {}", config.output.domains_path);
    if let Some(ledger) = &config.output.ledger_path {
        println!("  Ledger: {}", ledger);
    }

    let seeds = &config.seeds;
    println!("\nSeeds:");
    println!("  Static terms: {}", seeds.terms.len());
    for file in &seeds.files {
        println!("  * file {}", file);
    }
    for url in &seeds.urls {
        println!("  * url {}", url);
    }
    if seeds.generate_prefixes > 0 {
        println!(
            "  Generated prefixes: {} ({} terms)",
            seeds.generate_prefixes,
            26usize.pow(seeds.generate_prefixes as u32)
        );
    }

    let prior = load_existing(
        Path::new(&config.output.results_path),
        Path::new(&config.output.domains_path),
    )?;
    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would resume with {} known results ({} entities)",
        prior.results.len(),
        prior.entities.len()
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the ledger
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let Some(ledger_path) = &config.output.ledger_path else {
        return Err("No ledger-path configured; statistics need a ledger".into());
    };

    println!("Ledger: {}\n", ledger_path);

    let ledger = SqliteLedger::new(Path::new(ledger_path))?;
    let prior = load_existing(
        Path::new(&config.output.results_path),
        Path::new(&config.output.domains_path),
    )?;
    let stats = load_statistics(&ledger, &prior)?;

    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: &str,
    fresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous results)");
    } else {
        tracing::info!("Starting crawl (resuming from previous results if any)");
    }

    match run_crawl(config, config_hash, fresh).await {
        Ok(summary) => {
            tracing::info!("Crawl finished");
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
