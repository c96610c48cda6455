//! Integration tests for the crawler
//!
//! These tests use wiremock to stand up a mock search endpoint and run the
//! full crawl cycle end-to-end through the HTTP search client.

use std::collections::HashSet;
use tempfile::TempDir;
use term_harvest::config::{
    Config, CrawlerConfig, OutputConfig, SearchConfig, SeedsConfig, UserAgentConfig,
};
use term_harvest::crawler::Coordinator;
use term_harvest::storage::{Ledger, RunStatus, SqliteLedger};
use term_harvest::Term;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock endpoint
fn create_test_config(endpoint: &str, dir: &TempDir) -> Config {
    Config {
        crawler: CrawlerConfig {
            workers: 3,
            long_cooldown_secs: 1,
            short_cooldown_secs: 0,
            delay_between_terms_ms: 0,
            ..Default::default()
        },
        search: SearchConfig {
            endpoint: endpoint.to_string(),
            query_param: "q".to_string(),
            timeout_secs: 5,
            name_attribute: "data-school-name".to_string(),
            domains_attribute: "data-email-domains".to_string(),
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            results_path: dir.path().join("results.txt").display().to_string(),
            domains_path: dir.path().join("domains.txt").display().to_string(),
            ledger_path: Some(dir.path().join("ledger.db").display().to_string()),
        },
        seeds: SeedsConfig::default(),
    }
}

/// Renders a search result page the way the endpoint does
///
/// Each record is `(entity name, comma-separated domains)`.
fn results_page(records: &[(&str, &str)]) -> String {
    let mut body = String::from("<html><body><ul>");
    for (name, domains) in records {
        let list = domains
            .split(',')
            .filter(|d| !d.is_empty())
            .map(|d| format!("&quot;{}&quot;", d))
            .collect::<Vec<_>>()
            .join(",");
        body.push_str(&format!(
            r#"<li data-school-name="{}" data-email-domains="[[{}]]">{}</li>"#,
            name, list, name
        ));
    }
    body.push_str("</ul></body></html>");
    body
}

async fn mount_term(server: &MockServer, term: &str, records: &[(&str, &str)]) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", term))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page(records)))
        .mount(server)
        .await;
}

/// Every other query returns an empty result page
async fn mount_fallback(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page(&[])))
        .with_priority(10)
        .mount(server)
        .await;
}

fn seeds(list: &[&str]) -> Vec<Term> {
    list.iter().filter_map(|t| Term::new(t)).collect()
}

fn read_lines(path: &str) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

async fn queried_terms(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|request| {
            request
                .url
                .query_pairs()
                .find(|(key, _)| key == "q")
                .map(|(_, value)| value.into_owned())
        })
        .collect()
}

#[tokio::test]
async fn test_full_crawl_against_mock_endpoint() {
    let server = MockServer::start().await;
    mount_term(&server, "college", &[("Acme College", "acme.edu")]).await;
    mount_term(
        &server,
        "acme",
        &[
            ("Acme College", "acme.edu"),
            ("Acme Polytechnic", "acmepoly.edu,mail.acmepoly.edu"),
        ],
    )
    .await;
    mount_fallback(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/search", server.uri()), &dir);
    let results_path = config.output.results_path.clone();
    let domains_path = config.output.domains_path.clone();

    let coordinator = Coordinator::new(config, "hash", false).expect("coordinator");
    let summary = coordinator.run(seeds(&["college"])).await.expect("crawl");

    let results: HashSet<String> = read_lines(&results_path).into_iter().collect();
    let expected: HashSet<String> = [
        "acme.edu--Acme College",
        "acmepoly.edu--Acme Polytechnic",
        "mail.acmepoly.edu--Acme Polytechnic",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    assert_eq!(results, expected);
    assert_eq!(read_lines(&domains_path).len(), 3);

    // college, acme, polytechnic: each dispatched exactly once
    let mut queried = queried_terms(&server).await;
    queried.sort();
    assert_eq!(queried, vec!["acme", "college", "polytechnic"]);
    assert_eq!(summary.dispatched, 3);
    assert_eq!(summary.new_entities, 2);

    let ledger = SqliteLedger::new(&dir.path().join("ledger.db")).unwrap();
    let run = ledger.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(ledger.count_distinct_terms().unwrap(), 3);
}

#[tokio::test]
async fn test_rate_limited_term_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "college"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_term(&server, "college", &[("Acme College", "acme.edu")]).await;
    mount_fallback(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/search", server.uri()), &dir);
    let results_path = config.output.results_path.clone();

    let coordinator = Coordinator::new(config, "hash", false).unwrap();
    let summary = coordinator.run(seeds(&["college"])).await.unwrap();

    assert_eq!(read_lines(&results_path), vec!["acme.edu--Acme College"]);
    assert_eq!(summary.throttles, 2);
    assert_eq!(summary.succeeded, 2);

    let queried = queried_terms(&server).await;
    assert_eq!(queried.iter().filter(|t| *t == "college").count(), 3);
}

#[tokio::test]
async fn test_hard_failure_abandons_term() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/search", server.uri()), &dir);
    let results_path = config.output.results_path.clone();

    let coordinator = Coordinator::new(config, "hash", false).unwrap();
    let summary = coordinator.run(seeds(&["college", "university"])).await.unwrap();

    assert_eq!(summary.failed, 2);
    assert_eq!(summary.throttles, 0);
    assert!(read_lines(&results_path).is_empty());
    assert_eq!(queried_terms(&server).await.len(), 2);
}

#[tokio::test]
async fn test_unreadable_domain_payload_still_expands() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "college"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div data-school-name="Harbor Academy" data-email-domains="[[broken"></div>"#,
        ))
        .mount(&server)
        .await;
    mount_fallback(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/search", server.uri()), &dir);
    let results_path = config.output.results_path.clone();

    let coordinator = Coordinator::new(config, "hash", false).unwrap();
    coordinator.run(seeds(&["college"])).await.unwrap();

    assert!(read_lines(&results_path).is_empty());
    let mut queried = queried_terms(&server).await;
    queried.sort();
    assert_eq!(queried, vec!["academy", "college", "harbor"]);
}

#[tokio::test]
async fn test_restart_after_interruption_is_idempotent() {
    let server = MockServer::start().await;
    mount_term(&server, "college", &[("Acme College", "acme.edu")]).await;
    mount_term(
        &server,
        "acme",
        &[("Acme Polytechnic", "acmepoly.edu")],
    )
    .await;
    mount_fallback(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/search", server.uri()), &dir);
    let results_path = config.output.results_path.clone();

    // An interrupted run left one complete line and one torn line behind
    std::fs::write(
        &results_path,
        "acme.edu--Acme College\nacmepoly.edu--Acme Poly",
    )
    .unwrap();

    let coordinator = Coordinator::new(config.clone(), "hash", false).unwrap();
    coordinator.run(seeds(&["college", "acme"])).await.unwrap();

    // The complete line survives, the torn one is replaced by the real entry
    let after = read_lines(&results_path);
    assert_eq!(after[0], "acme.edu--Acme College");
    assert!(after.contains(&"acmepoly.edu--Acme Polytechnic".to_string()));
    assert!(!after.contains(&"acmepoly.edu--Acme Poly".to_string()));

    let unique: HashSet<&String> = after.iter().collect();
    assert_eq!(unique.len(), after.len(), "duplicate lines: {:?}", after);

    // A second restart adds nothing
    let coordinator = Coordinator::new(config, "hash", false).unwrap();
    coordinator.run(seeds(&["college", "acme"])).await.unwrap();
    assert_eq!(read_lines(&results_path), after);
}

#[tokio::test]
async fn test_term_cap_stops_expansion() {
    let server = MockServer::start().await;
    mount_term(
        &server,
        "college",
        &[
            ("Alpha College", "alpha.edu"),
            ("Bravo College", "bravo.edu"),
            ("Charlie College", "charlie.edu"),
        ],
    )
    .await;
    mount_fallback(&server).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&format!("{}/search", server.uri()), &dir);
    config.crawler.max_terms = Some(2);
    let results_path = config.output.results_path.clone();

    let coordinator = Coordinator::new(config, "hash", false).unwrap();
    let summary = coordinator.run(seeds(&["college"])).await.unwrap();

    assert_eq!(summary.dispatched, 2);
    assert_eq!(coordinator.state().frontier().accepted(), 2);
    // Records of a dispatched term are still persisted past the cap
    assert_eq!(read_lines(&results_path).len(), 3);
}
