// SPDX-License-Identifier: PMPL-1.0-or-later

//! Rebuilding reports from the evidence trail

use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;
use waf_assay::audit::MemoryAudit;
use waf_assay::campaign::Campaign;
use waf_assay::classify::ResultClassifier;
use waf_assay::config::{RunConfig, Settings};
use waf_assay::interrupt::Interrupt;
use waf_assay::recover::recover_results;
use waf_assay::report;
use waf_assay::types::RunMetadata;

#[test]
fn evidence_alone_reproduces_the_run() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/login");
        then.status(200).body("<form>Please complete the captcha</form>");
    });
    server.mock(|when, then| {
        when.method(POST).path("/upload");
        then.status(500);
    });
    server.mock(|when, then| {
        when.method(GET).path("/files");
        then.status(200).body("index of /files");
    });

    let scenarios = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    fs::write(
        scenarios.path().join("01-login.json"),
        r#"{"name": "login-bruteforce", "description": "credential stuffing",
            "steps": [{"path": "/login", "repeat": 2}]}"#,
    )
    .unwrap();
    fs::write(
        scenarios.path().join("02-upload.json"),
        r#"{"name": "webshell-upload", "description": "php upload",
            "steps": [
                {"method": "POST", "path": "/upload", "body": "<?php system($_GET[c]); ?>",
                 "expect_http_codes": [500]},
                {"path": "/files"}
            ]}"#,
    )
    .unwrap();

    let config = RunConfig::resolve(Settings {
        target: Some(server.base_url()),
        scope: Some(regex::escape(&server.base_url())),
        rate_limit: Some(0),
        output_dir: Some(output.path().to_path_buf()),
        ..Settings::default()
    })
    .unwrap();

    let paths = waf_assay::scenario::discover(scenarios.path(), false).unwrap();
    let outcome = Campaign::new(&config, Interrupt::new())
        .run(&paths, &mut MemoryAudit::default())
        .unwrap();
    let original = outcome.summary().unwrap().report.clone();

    // Simulate losing every in-memory and report artifact.
    fs::remove_file(config.report_json_path()).unwrap();
    fs::remove_file(config.report_markdown_path()).unwrap();

    let recovered =
        recover_results(&config.evidence_dir(), &ResultClassifier::default()).unwrap();
    assert_eq!(recovered.unanswered, 0);
    assert_eq!(recovered.results, original.results);

    let rebuilt = report::build_report(
        recovered.results,
        &RunMetadata::now(recovered.target.unwrap()),
        &config.evidence_dir(),
    )
    .unwrap();
    assert_eq!(rebuilt.total_requests, original.total_requests);
    assert_eq!(rebuilt.total_requests, 4);
    assert_eq!(rebuilt.effectiveness(), original.effectiveness());
}
