// SPDX-License-Identifier: PMPL-1.0-or-later

//! Whole-run driver
//!
//! Runs scenario files strictly in the order given, collects results in
//! execution order, and writes both reports. Scenario validation failures
//! are isolated; scope violations abort the run with no reports; an
//! interruption writes best-effort partial reports.

use crate::audit::AuditSink;
use crate::config::RunConfig;
use crate::error::{EngineError, ScenarioError};
use crate::interrupt::Interrupt;
use crate::probe::RequestExecutor;
use crate::report;
use crate::runner::ScenarioRunner;
use crate::scenario::{self, Scenario};
use crate::storage::EvidenceStore;
use crate::types::{RunMetadata, RunReport, ScenarioResult};
use anyhow::Result;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CampaignSummary {
    pub report: RunReport,
    pub json_path: PathBuf,
    pub markdown_path: PathBuf,
    pub failed_scenarios: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum CampaignOutcome {
    Completed(CampaignSummary),
    /// `summary` is `None` when even partial reports could not be written
    Interrupted {
        signal: i32,
        summary: Option<CampaignSummary>,
    },
}

impl CampaignOutcome {
    pub fn summary(&self) -> Option<&CampaignSummary> {
        match self {
            CampaignOutcome::Completed(summary) => Some(summary),
            CampaignOutcome::Interrupted { summary, .. } => summary.as_ref(),
        }
    }

    /// Process exit status for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            CampaignOutcome::Completed(_) => 0,
            CampaignOutcome::Interrupted { signal, .. } => 128 + signal,
        }
    }
}

pub struct Campaign<'a> {
    config: &'a RunConfig,
    interrupt: Interrupt,
}

impl<'a> Campaign<'a> {
    pub fn new(config: &'a RunConfig, interrupt: Interrupt) -> Self {
        Self { config, interrupt }
    }

    pub fn run(
        &self,
        scenario_paths: &[PathBuf],
        audit: &mut dyn AuditSink,
    ) -> Result<CampaignOutcome> {
        let config = self.config;
        log::info!(
            "starting run against {} ({} scenario files, {} rps)",
            config.target,
            scenario_paths.len(),
            config.rate_limit
        );
        audit.record(&format!(
            "RUN START target={} scope={} rate_limit={} timeout={}s scenarios={}",
            config.target,
            config.scope.pattern(),
            config.rate_limit,
            config.timeout.as_secs(),
            scenario_paths.len()
        ));

        let store = EvidenceStore::open(&config.evidence_dir())?;
        let executor = RequestExecutor::new(store, config.timeout);
        let mut runner = ScenarioRunner::new(config, executor, self.interrupt.clone());

        let mut results: Vec<ScenarioResult> = Vec::new();
        let mut failed = Vec::new();
        let mut interrupted = None;

        for path in scenario_paths {
            if let Some(signal) = self.interrupt.signal() {
                interrupted = Some(signal);
                break;
            }
            match runner.run_file(path, audit) {
                Ok(Some(result)) => results.push(result),
                Ok(None) => failed.push(path.clone()),
                Err(EngineError::Interrupted { signal }) => {
                    interrupted = Some(signal);
                    break;
                }
                Err(e) => {
                    log::error!("run aborted: {}", e);
                    audit.record(&format!("RUN ABORTED reason={}", e));
                    return Err(e.into());
                }
            }
        }

        if let Some(signal) = interrupted {
            return Ok(self.finalize_interrupted(signal, results, failed, audit));
        }

        let summary = self.finalize(results, failed)?;
        audit.record(&format!(
            "RUN COMPLETE scenarios={} failed={} requests={}",
            summary.report.total_scenarios,
            summary.failed_scenarios.len(),
            summary.report.total_requests
        ));
        Ok(CampaignOutcome::Completed(summary))
    }

    fn finalize(
        &self,
        results: Vec<ScenarioResult>,
        failed: Vec<PathBuf>,
    ) -> Result<CampaignSummary> {
        let evidence_dir = self.config.evidence_dir();
        let report = report::build_report(
            results,
            &RunMetadata::now(self.config.target.clone()),
            &evidence_dir,
        )?;
        let json_path = self.config.report_json_path();
        let markdown_path = self.config.report_markdown_path();
        report::save_reports(&report, &json_path, &markdown_path, &evidence_dir)?;
        Ok(CampaignSummary {
            report,
            json_path,
            markdown_path,
            failed_scenarios: failed,
        })
    }

    /// Best-effort partial reports. Failures are logged, never propagated,
    /// so the interruption itself stays the reported cause.
    fn finalize_interrupted(
        &self,
        signal: i32,
        results: Vec<ScenarioResult>,
        failed: Vec<PathBuf>,
        audit: &mut dyn AuditSink,
    ) -> CampaignOutcome {
        log::warn!(
            "run interrupted by signal {}; writing partial reports for {} completed scenarios",
            signal,
            results.len()
        );
        audit.record(&format!(
            "RUN INTERRUPTED signal={} completed_scenarios={}",
            signal,
            results.len()
        ));

        let summary = match self.finalize(results, failed) {
            Ok(summary) => {
                audit.record(&format!(
                    "PARTIAL REPORT scenarios={} requests={}",
                    summary.report.total_scenarios, summary.report.total_requests
                ));
                Some(summary)
            }
            Err(e) => {
                log::error!("partial report generation failed: {:#}", e);
                audit.record(&format!("PARTIAL REPORT FAILED reason={:#}", e));
                None
            }
        };

        CampaignOutcome::Interrupted { signal, summary }
    }
}

/// Result of validating one scenario file without sending anything
#[derive(Debug)]
pub struct ValidationEntry {
    pub path: PathBuf,
    pub scenario: Result<Scenario, ScenarioError>,
    /// Step URLs the scope guard would refuse (only with a config)
    pub out_of_scope: Vec<String>,
}

/// Parse every file and, given a config, scope-check each step URL
pub fn validate_files(paths: &[PathBuf], config: Option<&RunConfig>) -> Vec<ValidationEntry> {
    paths
        .iter()
        .map(|path| validate_file(path, config))
        .collect()
}

fn validate_file(path: &Path, config: Option<&RunConfig>) -> ValidationEntry {
    let scenario = scenario::load_scenario(path);
    let out_of_scope = match (&scenario, config) {
        (Ok(scenario), Some(config)) => scenario
            .steps
            .iter()
            .map(|step| config.url_for(&step.path))
            .filter(|url| !config.scope.check(url))
            .collect(),
        _ => Vec::new(),
    };
    ValidationEntry {
        path: path.to_path_buf(),
        scenario,
        out_of_scope,
    }
}
