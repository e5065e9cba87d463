// SPDX-License-Identifier: PMPL-1.0-or-later

//! Report aggregation

use crate::error::EngineError;
use crate::storage;
use crate::types::*;
use std::path::Path;

pub struct ReportAggregator;

impl ReportAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Assemble the run report. `total_requests` is always taken from the
    /// response records in `evidence_dir`, never from an in-memory counter,
    /// so an interrupted run reports exactly what was sent.
    pub fn build(
        &self,
        results: Vec<ScenarioResult>,
        metadata: &RunMetadata,
        evidence_dir: &Path,
    ) -> Result<RunReport, EngineError> {
        let total_requests = storage::count_responses(evidence_dir)?;
        let attempts: usize = results.iter().map(|r| r.results.total()).sum();
        if attempts != total_requests {
            log::debug!(
                "evidence holds {} responses, scenario results account for {}",
                total_requests,
                attempts
            );
        }

        Ok(RunReport {
            framework: FRAMEWORK_NAME.to_string(),
            version: FRAMEWORK_VERSION.to_string(),
            target: metadata.target.clone(),
            timestamp: metadata.timestamp,
            total_scenarios: results.len(),
            total_requests,
            results,
        })
    }
}

impl Default for ReportAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{sha256_hex, BodyEncoding, EvidenceStore, ResponseEvidence};

    fn write_responses(dir: &Path, n: usize) {
        let mut store = EvidenceStore::open(dir).unwrap();
        for _ in 0..n {
            let id = store.next_id();
            store
                .write_response(&ResponseEvidence {
                    id,
                    status: 403,
                    headers: vec![],
                    body: String::new(),
                    body_encoding: BodyEncoding::Utf8,
                    body_bytes: 0,
                    body_truncated: false,
                    body_sha256: sha256_hex(b""),
                    received_at: chrono::Utc::now(),
                    elapsed_ms: 1,
                    transport_error: None,
                })
                .unwrap();
        }
    }

    #[test]
    fn total_requests_comes_from_evidence() {
        let dir = tempfile::tempdir().unwrap();
        write_responses(dir.path(), 7);

        let results = vec![ScenarioResult {
            scenario: "xss".into(),
            description: "reflected".into(),
            status: Outcome::Blocked,
            steps_executed: 1,
            results: OutcomeCounts {
                blocked: 2,
                ..OutcomeCounts::default()
            },
        }];
        let report = ReportAggregator::new()
            .build(results, &RunMetadata::now("https://a.test"), dir.path())
            .unwrap();

        assert_eq!(report.total_requests, 7);
        assert_eq!(report.total_scenarios, 1);
        assert_eq!(report.framework, FRAMEWORK_NAME);
    }

    #[test]
    fn empty_run_without_evidence_directory() {
        let dir = tempfile::tempdir().unwrap();
        let report = ReportAggregator::new()
            .build(
                Vec::new(),
                &RunMetadata::now("https://a.test"),
                &dir.path().join("evidence"),
            )
            .unwrap();
        assert_eq!(report.total_requests, 0);
        assert_eq!(report.effectiveness(), None);
    }
}
