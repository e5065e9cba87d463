// SPDX-License-Identifier: PMPL-1.0-or-later

//! Report output: JSON/Markdown files and the console summary

use crate::report::narrative::render_markdown;
use crate::types::*;
use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::Path;

pub struct ReportFormatter;

impl ReportFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn save_json<P: AsRef<Path>>(&self, report: &RunReport, path: P) -> Result<()> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let json = serde_json::to_string_pretty(report)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        log::info!("structured report saved to {}", path.display());
        Ok(())
    }

    pub fn save_markdown<P: AsRef<Path>>(
        &self,
        report: &RunReport,
        path: P,
        evidence_dir: &Path,
    ) -> Result<()> {
        let path = path.as_ref();
        ensure_parent(path)?;
        fs::write(path, render_markdown(report, evidence_dir))
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!("narrative report saved to {}", path.display());
        Ok(())
    }

    pub fn print(&self, report: &RunReport) {
        println!("\n{}", "=== WAF-ASSAY REPORT ===".bold().cyan());
        println!("  Target: {}", report.target);
        println!("  Scenarios: {}", report.total_scenarios);
        println!("  Requests: {}", report.total_requests);
        println!();

        for result in &report.results {
            println!(
                "  {} {} ({} steps; {} allowed, {} blocked, {} challenged, {} inconclusive)",
                colorize(result.status),
                result.scenario.bold(),
                result.steps_executed,
                result.results.allowed,
                result.results.blocked,
                result.results.challenged,
                result.results.inconclusive
            );
        }
        println!();

        match report.effectiveness() {
            Some(pct) => {
                let text = format!("{:.1}%", pct);
                let shaded = if pct >= 80.0 {
                    text.green()
                } else if pct >= 50.0 {
                    text.yellow()
                } else {
                    text.red()
                };
                println!("  Effectiveness: {}", shaded.bold());
            }
            None => println!("  Effectiveness: {}", "n/a (no scenarios)".dimmed()),
        }
        println!();
    }
}

fn colorize(outcome: Outcome) -> ColoredString {
    let label = format!("{:<12}", outcome.as_str());
    match outcome {
        Outcome::Blocked => label.green(),
        Outcome::Challenged => label.yellow(),
        Outcome::Allowed => label.red().bold(),
        Outcome::Inconclusive => label.dimmed(),
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    Ok(())
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new()
    }
}
