// SPDX-License-Identifier: PMPL-1.0-or-later

//! Rebuild scenario results from evidence alone
//!
//! Request records carry the scenario name, step index, attempt and the
//! expected codes, and classification is pure, so the verdicts of an
//! interrupted or crashed run can be recomputed from the evidence
//! directory without any in-memory state.

use crate::classify::ResultClassifier;
use crate::error::EngineError;
use crate::runner::reduce_verdict;
use crate::storage::{self, Exchange};
use crate::types::{Outcome, OutcomeCounts, ScenarioResult};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Recovered {
    pub results: Vec<ScenarioResult>,
    /// Request records with no response record (never completed)
    pub unanswered: usize,
    /// Origin of the first recorded request, if any
    pub target: Option<String>,
}

struct Group {
    scenario: String,
    description: String,
    last_position: (usize, u32),
    steps: BTreeSet<usize>,
    outcomes: Vec<Outcome>,
}

impl Group {
    fn into_result(self) -> ScenarioResult {
        ScenarioResult {
            status: reduce_verdict(&self.outcomes),
            results: self.outcomes.iter().copied().collect::<OutcomeCounts>(),
            scenario: self.scenario,
            description: self.description,
            steps_executed: self.steps.len(),
        }
    }
}

pub fn recover_results(
    evidence_dir: &Path,
    classifier: &ResultClassifier,
) -> Result<Recovered, EngineError> {
    let exchanges = storage::load_exchanges(evidence_dir)?;
    Ok(rebuild(&exchanges, classifier))
}

fn origin_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .map(|u| u.origin().ascii_serialization())
}

/// Consecutive exchanges for the same scenario form one run of it; a step
/// or attempt position that does not advance starts a new run, since
/// scenario names need not be unique.
fn rebuild(exchanges: &[Exchange], classifier: &ResultClassifier) -> Recovered {
    let mut recovered = Recovered {
        target: exchanges.first().and_then(|e| origin_of(&e.request.url)),
        ..Recovered::default()
    };
    let mut current: Option<Group> = None;

    for exchange in exchanges {
        let request = &exchange.request;
        let Some(response) = &exchange.response else {
            log::warn!(
                "request {} ({} {}) has no response record; not counted",
                request.id,
                request.method,
                request.url
            );
            recovered.unanswered += 1;
            continue;
        };

        let position = (request.step_index, request.attempt);
        let continues = current
            .as_ref()
            .map(|g| g.scenario == request.scenario && position > g.last_position)
            .unwrap_or(false);
        if !continues {
            if let Some(done) = current.take() {
                recovered.results.push(done.into_result());
            }
            current = Some(Group {
                scenario: request.scenario.clone(),
                description: request.description.clone(),
                last_position: position,
                steps: BTreeSet::new(),
                outcomes: Vec::new(),
            });
        }

        if let Some(group) = current.as_mut() {
            group.last_position = position;
            group.steps.insert(request.step_index);
            group.outcomes.push(classifier.classify(
                response.status,
                &response.body_text(),
                &request.expected_codes,
            ));
        }
    }

    if let Some(done) = current {
        recovered.results.push(done.into_result());
    }
    recovered
}
