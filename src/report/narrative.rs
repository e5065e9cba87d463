// SPDX-License-Identifier: PMPL-1.0-or-later

//! Human-readable Markdown report

use crate::types::*;
use std::fmt::Write;
use std::path::Path;

pub fn render_markdown(report: &RunReport, evidence_dir: &Path) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_markdown(&mut out, report, evidence_dir);
    out
}

fn write_markdown(out: &mut String, report: &RunReport, evidence_dir: &Path) -> std::fmt::Result {
    writeln!(out, "# WAF Assessment Report")?;
    writeln!(out)?;
    writeln!(out, "- **Framework:** {} {}", report.framework, report.version)?;
    writeln!(out, "- **Target:** {}", report.target)?;
    writeln!(out, "- **Completed:** {}", report.timestamp.to_rfc3339())?;
    writeln!(out)?;

    writeln!(out, "## Executive Summary")?;
    writeln!(out)?;
    writeln!(out, "| Metric | Count |")?;
    writeln!(out, "|---|---|")?;
    writeln!(out, "| Scenarios executed | {} |", report.total_scenarios)?;
    writeln!(out, "| Requests sent | {} |", report.total_requests)?;
    for outcome in Outcome::all() {
        writeln!(out, "| {} | {} |", outcome, report.scenarios_with(outcome))?;
    }
    writeln!(out)?;
    if let Some(pct) = report.effectiveness() {
        writeln!(
            out,
            "**Protection effectiveness:** {:.1}% of scenarios were blocked or challenged.",
            pct
        )?;
        writeln!(out)?;
    }

    writeln!(out, "## Scenario Results")?;
    writeln!(out)?;
    if report.results.is_empty() {
        writeln!(out, "_No scenarios completed._")?;
        writeln!(out)?;
    }
    for result in &report.results {
        writeln!(out, "### {}", result.scenario)?;
        writeln!(out)?;
        if !result.description.is_empty() {
            writeln!(out, "{}", result.description)?;
            writeln!(out)?;
        }
        writeln!(out, "- **Status:** {}", result.status)?;
        writeln!(out, "- **Steps executed:** {}", result.steps_executed)?;
        writeln!(
            out,
            "- **Attempts:** {} allowed, {} blocked, {} challenged, {} inconclusive",
            result.results.allowed,
            result.results.blocked,
            result.results.challenged,
            result.results.inconclusive
        )?;
        writeln!(out)?;
    }

    writeln!(out, "## Evidence")?;
    writeln!(out)?;
    writeln!(
        out,
        "Full request and response records for every attempt are stored in `{}`.",
        evidence_dir.display()
    )?;
    writeln!(
        out,
        "Each attempt has a `<id>.request.json` and a `<id>.response.json` record; ids sort in issue order."
    )?;
    writeln!(out)?;

    writeln!(out, "## Methodology")?;
    writeln!(out)?;
    writeln!(
        out,
        "Scenarios run one at a time against the authorized target only. Every request URL is checked \
         against the configured scope before it is sent and the run aborts on any violation. Requests \
         are spaced by a fixed-interval rate limiter. No exploitation is attempted."
    )?;
    writeln!(out)?;
    writeln!(out, "### Classification Legend")?;
    writeln!(out)?;
    writeln!(out, "| Outcome | Meaning |")?;
    writeln!(out, "|---|---|")?;
    writeln!(
        out,
        "| BLOCKED | HTTP 403, 406 or 418, or a status the scenario listed as expected |"
    )?;
    writeln!(
        out,
        "| CHALLENGED | HTTP 429 or 503, or a 2xx response whose body carries a block/challenge signature |"
    )?;
    writeln!(out, "| ALLOWED | HTTP 200, 201, 202 or 204 with an ordinary body |")?;
    writeln!(
        out,
        "| INCONCLUSIVE | No response (timeout, connection or DNS failure) or an unexpected status |"
    )?;
    writeln!(out)?;
    writeln!(
        out,
        "A scenario is ALLOWED if any attempt was allowed, BLOCKED only if every attempt was blocked, \
         otherwise CHALLENGED if any attempt was challenged, and INCONCLUSIVE in all other cases."
    )?;

    Ok(())
}
