// SPDX-License-Identifier: PMPL-1.0-or-later

//! Core type definitions for waf-assay
//!
//! Outcomes are assigned per request attempt and reduced per scenario.
//! The serialized names are part of the structured report format.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Framework identity written into every report
pub const FRAMEWORK_NAME: &str = "waf-assay";

/// Framework version written into every report
pub const FRAMEWORK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Status reported when no HTTP response was received at all
/// (DNS failure, refused connection, timeout). Rendered as `000`.
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

/// Classification of a single attempt, or of a whole scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Blocked,
    Allowed,
    Challenged,
    Inconclusive,
}

impl Outcome {
    pub fn all() -> [Outcome; 4] {
        [
            Outcome::Blocked,
            Outcome::Allowed,
            Outcome::Challenged,
            Outcome::Inconclusive,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Blocked => "BLOCKED",
            Outcome::Allowed => "ALLOWED",
            Outcome::Challenged => "CHALLENGED",
            Outcome::Inconclusive => "INCONCLUSIVE",
        }
    }

    /// Whether this verdict counts towards protection effectiveness
    pub fn is_defended(&self) -> bool {
        matches!(self, Outcome::Blocked | Outcome::Challenged)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-outcome attempt counts for one scenario
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub allowed: usize,
    pub blocked: usize,
    pub challenged: usize,
    pub inconclusive: usize,
}

impl OutcomeCounts {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Allowed => self.allowed += 1,
            Outcome::Blocked => self.blocked += 1,
            Outcome::Challenged => self.challenged += 1,
            Outcome::Inconclusive => self.inconclusive += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.allowed + self.blocked + self.challenged + self.inconclusive
    }
}

impl FromIterator<Outcome> for OutcomeCounts {
    fn from_iter<I: IntoIterator<Item = Outcome>>(iter: I) -> Self {
        let mut counts = OutcomeCounts::default();
        for outcome in iter {
            counts.record(outcome);
        }
        counts
    }
}

/// Final verdict for one executed scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario: String,
    pub description: String,
    pub status: Outcome,
    pub steps_executed: usize,
    pub results: OutcomeCounts,
}

/// Run-level facts that do not come from scenario execution
#[derive(Debug, Clone)]
pub struct RunMetadata {
    pub target: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl RunMetadata {
    pub fn now(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Structured report, serialized verbatim as the machine-readable artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub framework: String,
    pub version: String,
    pub target: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub total_scenarios: usize,
    pub total_requests: usize,
    pub results: Vec<ScenarioResult>,
}

impl RunReport {
    /// Number of scenarios whose verdict was `outcome`
    pub fn scenarios_with(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.status == outcome).count()
    }

    /// Percentage of scenarios that were blocked or challenged, rounded to
    /// one decimal place. `None` when no scenario ran.
    pub fn effectiveness(&self) -> Option<f64> {
        if self.total_scenarios == 0 {
            return None;
        }
        let defended = self
            .results
            .iter()
            .filter(|r| r.status.is_defended())
            .count() as f64;
        let pct = defended / self.total_scenarios as f64 * 100.0;
        Some((pct * 10.0).round() / 10.0)
    }
}
