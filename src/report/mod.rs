// SPDX-License-Identifier: PMPL-1.0-or-later

//! Report generation module

pub mod formatter;
pub mod generator;
pub mod narrative;

use crate::error::EngineError;
use crate::types::*;
use anyhow::Result;
use std::path::Path;

pub use formatter::ReportFormatter;
pub use generator::ReportAggregator;
pub use narrative::render_markdown;

/// Build a run report from scenario results and on-disk evidence
pub fn build_report(
    results: Vec<ScenarioResult>,
    metadata: &RunMetadata,
    evidence_dir: &Path,
) -> Result<RunReport, EngineError> {
    ReportAggregator::new().build(results, metadata, evidence_dir)
}

/// Write both report artifacts
pub fn save_reports(
    report: &RunReport,
    json_path: &Path,
    markdown_path: &Path,
    evidence_dir: &Path,
) -> Result<()> {
    let formatter = ReportFormatter::new();
    formatter.save_json(report, json_path)?;
    formatter.save_markdown(report, markdown_path, evidence_dir)?;
    Ok(())
}

/// Print report to console
pub fn print_report(report: &RunReport) {
    let formatter = ReportFormatter::new();
    formatter.print(report);
}
