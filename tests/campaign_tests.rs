// SPDX-License-Identifier: PMPL-1.0-or-later

//! End-to-end runs against a mock target

use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use waf_assay::audit::MemoryAudit;
use waf_assay::campaign::{self, Campaign, CampaignOutcome};
use waf_assay::config::{RunConfig, Settings};
use waf_assay::interrupt::{Interrupt, SIGINT};
use waf_assay::storage;
use waf_assay::types::{Outcome, RunReport};

fn config(server: &MockServer, output: &Path) -> RunConfig {
    RunConfig::resolve(Settings {
        target: Some(server.base_url()),
        scope: Some(regex::escape(&server.base_url())),
        rate_limit: Some(0),
        timeout_secs: Some(5),
        output_dir: Some(output.to_path_buf()),
        ..Settings::default()
    })
    .expect("valid config")
}

fn write_scenario(dir: &Path, file: &str, body: &str) -> PathBuf {
    let path = dir.join(file);
    fs::write(&path, body).unwrap();
    path
}

fn load_report(path: &Path) -> RunReport {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn blocked_scenario_end_to_end() {
    let server = MockServer::start();
    let waf = server.mock(|when, then| {
        when.method(GET).path("/");
        then.status(403).body("Request blocked");
    });

    let scenarios = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let file = write_scenario(
        scenarios.path(),
        "01-root.json",
        r#"{
            "name": "root-probe",
            "description": "plain GET twice",
            "steps": [{"method": "GET", "path": "/", "expect_http_codes": [200, 403], "repeat": 2}]
        }"#,
    );

    let config = config(&server, output.path());
    let mut audit = MemoryAudit::default();
    let outcome = Campaign::new(&config, Interrupt::new())
        .run(&[file], &mut audit)
        .unwrap();

    waf.assert_hits(2);
    let summary = match outcome {
        CampaignOutcome::Completed(summary) => summary,
        other => panic!("unexpected outcome: {:?}", other),
    };
    let result = &summary.report.results[0];
    assert_eq!(result.status, Outcome::Blocked);
    assert_eq!(result.steps_executed, 1);
    assert_eq!(result.results.blocked, 2);

    let on_disk = load_report(&summary.json_path);
    assert_eq!(on_disk.total_scenarios, 1);
    assert_eq!(on_disk.total_requests, 2);
    assert_eq!(on_disk.results, summary.report.results);

    let narrative = fs::read_to_string(&summary.markdown_path).unwrap();
    assert!(narrative.contains("### root-probe"));
    assert!(narrative.contains("**Protection effectiveness:** 100.0%"));
}

#[test]
fn invalid_scenarios_are_skipped_and_order_is_preserved() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/admin");
        then.status(200).body("dashboard");
    });
    server.mock(|when, then| {
        when.method(GET).path("/search");
        then.status(429);
    });

    let scenarios = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_scenario(
        scenarios.path(),
        "10-admin.json",
        r#"{"name": "admin-exposure", "description": "d", "steps": [{"path": "/admin"}]}"#,
    );
    write_scenario(
        scenarios.path(),
        "20-empty.json",
        r#"{"name": "empty", "description": "no steps", "steps": []}"#,
    );
    write_scenario(scenarios.path(), "30-broken.json", "{ not json");
    write_scenario(
        scenarios.path(),
        "40-search.yaml",
        "name: search-flood\ndescription: d\nsteps:\n  - path: /search\n    repeat: 3\n",
    );

    let paths = waf_assay::scenario::discover(scenarios.path(), false).unwrap();
    let config = config(&server, output.path());
    let mut audit = MemoryAudit::default();
    let outcome = Campaign::new(&config, Interrupt::new())
        .run(&paths, &mut audit)
        .unwrap();

    let summary = outcome.summary().expect("reports written");
    let names: Vec<_> = summary
        .report
        .results
        .iter()
        .map(|r| (r.scenario.as_str(), r.status))
        .collect();
    assert_eq!(
        names,
        vec![
            ("admin-exposure", Outcome::Allowed),
            ("search-flood", Outcome::Challenged)
        ]
    );
    assert_eq!(summary.failed_scenarios.len(), 2);
    assert_eq!(summary.report.total_requests, 4);
    assert_eq!(summary.report.effectiveness(), Some(50.0));
    assert_eq!(
        audit
            .entries
            .iter()
            .filter(|e| e.starts_with("SCENARIO FAILED"))
            .count(),
        2
    );
}

#[test]
fn transport_failures_are_inconclusive_not_fatal() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let target = format!("http://127.0.0.1:{}", port);

    let scenarios = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let file = write_scenario(
        scenarios.path(),
        "down.json",
        r#"{"name": "down", "description": "nothing listening", "steps": [{"repeat": 2}]}"#,
    );

    let config = RunConfig::resolve(Settings {
        target: Some(target.clone()),
        scope: Some(regex::escape(&target)),
        rate_limit: Some(0),
        timeout_secs: Some(2),
        output_dir: Some(output.path().to_path_buf()),
        ..Settings::default()
    })
    .unwrap();
    let outcome = Campaign::new(&config, Interrupt::new())
        .run(&[file], &mut MemoryAudit::default())
        .unwrap();

    let report = &outcome.summary().unwrap().report;
    assert_eq!(report.results[0].status, Outcome::Inconclusive);
    assert_eq!(report.results[0].results.inconclusive, 2);
    assert_eq!(report.total_requests, 2);
    assert_eq!(outcome.exit_code(), 0);
}

#[test]
fn scope_violation_aborts_run_without_reports() {
    let server = MockServer::start();
    let hits = server.mock(|when, then| {
        when.method(GET);
        then.status(200);
    });

    let scenarios = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let first = write_scenario(
        scenarios.path(),
        "01-escape.json",
        r#"{"name": "escape", "description": "d", "steps": [{"path": "/private"}]}"#,
    );
    let second = write_scenario(
        scenarios.path(),
        "02-never.json",
        r#"{"name": "never", "description": "d", "steps": [{"path": "/public"}]}"#,
    );

    let mut config = config(&server, output.path());
    config.scope = waf_assay::probe::ScopeGuard::new(&format!(
        "{}/public",
        regex::escape(&server.base_url())
    ))
    .unwrap();

    let mut audit = MemoryAudit::default();
    let err = Campaign::new(&config, Interrupt::new())
        .run(&[first, second], &mut audit)
        .unwrap_err();

    assert!(err.to_string().contains("scope violation"));
    hits.assert_hits(0);
    assert!(!config.report_json_path().exists());
    assert!(!config.report_markdown_path().exists());
    assert!(audit.entries.iter().any(|e| e.starts_with("RUN ABORTED")));
}

#[test]
fn interrupted_run_writes_partial_reports() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET);
        then.status(406);
    });

    let scenarios = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let file = write_scenario(
        scenarios.path(),
        "a.json",
        r#"{"name": "a", "description": "d", "steps": [{}]}"#,
    );

    let config = config(&server, output.path());
    let interrupt = Interrupt::new();
    interrupt.trigger(SIGINT);
    let outcome = Campaign::new(&config, interrupt)
        .run(&[file], &mut MemoryAudit::default())
        .unwrap();

    assert_eq!(outcome.exit_code(), 130);
    let summary = outcome.summary().expect("partial reports");
    assert_eq!(summary.report.total_scenarios, 0);
    assert!(summary.json_path.exists());
    assert!(summary.markdown_path.exists());
}

#[test]
fn total_requests_tracks_evidence_not_counters() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET);
        then.status(403);
    });

    let scenarios = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let file = write_scenario(
        scenarios.path(),
        "one.json",
        r#"{"name": "one", "description": "d", "steps": [{}]}"#,
    );
    let config = config(&server, output.path());

    // Evidence left behind by an earlier, crashed run in the same directory.
    fs::create_dir_all(config.evidence_dir()).unwrap();
    for i in 0..3 {
        fs::write(
            config
                .evidence_dir()
                .join(format!("19700101T000000.000000Z-1-{:06}-00000000.response.json", i)),
            "{}",
        )
        .unwrap();
    }

    let outcome = Campaign::new(&config, Interrupt::new())
        .run(&[file], &mut MemoryAudit::default())
        .unwrap();
    let report = &outcome.summary().unwrap().report;
    assert_eq!(report.results[0].results.total(), 1);
    assert_eq!(report.total_requests, 4);
    assert_eq!(
        storage::count_responses(&config.evidence_dir()).unwrap(),
        4
    );
}

#[test]
fn validation_flags_out_of_scope_steps() {
    let server = MockServer::start();
    let scenarios = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let good = write_scenario(
        scenarios.path(),
        "good.json",
        r#"{"name": "g", "description": "d", "steps": [{"path": "/api/x"}]}"#,
    );
    let bad = write_scenario(
        scenarios.path(),
        "bad.json",
        r#"{"name": "b", "description": "d", "steps": [{"path": "/other"}]}"#,
    );

    let mut config = config(&server, output.path());
    config.scope =
        waf_assay::probe::ScopeGuard::new(&format!("{}/api", regex::escape(&server.base_url())))
            .unwrap();

    let entries = campaign::validate_files(&[good, bad], Some(&config));
    assert!(entries[0].scenario.is_ok());
    assert!(entries[0].out_of_scope.is_empty());
    assert_eq!(
        entries[1].out_of_scope,
        vec![format!("{}/other", server.base_url())]
    );
}
