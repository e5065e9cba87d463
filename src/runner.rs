// SPDX-License-Identifier: PMPL-1.0-or-later

//! Scenario execution
//!
//! Drives one scenario's steps and repeats through throttle, scope check,
//! request execution and classification, then reduces the per-attempt
//! outcomes into a single verdict.

use crate::audit::AuditSink;
use crate::classify::ResultClassifier;
use crate::config::RunConfig;
use crate::error::EngineError;
use crate::interrupt::Interrupt;
use crate::probe::{ProbeRequest, RateLimiter, RequestExecutor};
use crate::scenario::{self, Scenario};
use crate::types::{Outcome, OutcomeCounts, ScenarioResult};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioState {
    Loaded,
    Validating,
    Executing,
    Aggregating,
    Done,
    Failed,
}

/// Reduce attempt outcomes to a scenario verdict.
///
/// A single ALLOWED attempt dominates; BLOCKED requires every attempt to be
/// blocked; otherwise any CHALLENGED wins; everything else (including no
/// attempts at all) is INCONCLUSIVE.
pub fn reduce_verdict(outcomes: &[Outcome]) -> Outcome {
    if outcomes.contains(&Outcome::Allowed) {
        Outcome::Allowed
    } else if !outcomes.is_empty() && outcomes.iter().all(|o| *o == Outcome::Blocked) {
        Outcome::Blocked
    } else if outcomes.contains(&Outcome::Challenged) {
        Outcome::Challenged
    } else {
        Outcome::Inconclusive
    }
}

pub struct ScenarioRunner<'a> {
    config: &'a RunConfig,
    limiter: RateLimiter,
    executor: RequestExecutor,
    classifier: ResultClassifier,
    interrupt: Interrupt,
    state: ScenarioState,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(config: &'a RunConfig, executor: RequestExecutor, interrupt: Interrupt) -> Self {
        Self {
            config,
            limiter: RateLimiter::new(config.rate_limit).with_interrupt(interrupt.clone()),
            executor,
            classifier: ResultClassifier::with_extra_signatures(&config.extra_signatures),
            interrupt,
            state: ScenarioState::Loaded,
        }
    }

    /// State reached by the most recent scenario
    pub fn state(&self) -> ScenarioState {
        self.state
    }

    fn check_interrupt(&self) -> Result<(), EngineError> {
        match self.interrupt.signal() {
            Some(signal) => Err(EngineError::Interrupted { signal }),
            None => Ok(()),
        }
    }

    fn transition(&mut self, scenario: &str, to: ScenarioState) {
        log::debug!("scenario '{}': {:?} -> {:?}", scenario, self.state, to);
        self.state = to;
    }

    /// Load, validate and execute the scenario file at `path`.
    ///
    /// Validation failures are scenario-scoped: they are logged and audited
    /// and yield `Ok(None)`. Scope violations, evidence failures and
    /// interruption are returned as errors.
    pub fn run_file(
        &mut self,
        path: &Path,
        audit: &mut dyn AuditSink,
    ) -> Result<Option<ScenarioResult>, EngineError> {
        let label = path.display().to_string();
        self.state = ScenarioState::Loaded;
        self.transition(&label, ScenarioState::Validating);

        match scenario::load_scenario(path) {
            Ok(scenario) => self.run(&scenario, audit).map(Some),
            Err(e) => {
                self.transition(&label, ScenarioState::Failed);
                log::error!("{}", e);
                audit.record(&format!("SCENARIO FAILED file={} reason={}", label, e));
                Ok(None)
            }
        }
    }

    /// Execute an already validated scenario
    pub fn run(
        &mut self,
        scenario: &Scenario,
        audit: &mut dyn AuditSink,
    ) -> Result<ScenarioResult, EngineError> {
        self.transition(&scenario.name, ScenarioState::Executing);
        log::info!(
            "running scenario '{}' ({} steps, {} requests)",
            scenario.name,
            scenario.steps.len(),
            scenario.planned_requests()
        );
        audit.record(&format!(
            "SCENARIO START name={} file={} steps={}",
            scenario.name,
            scenario.source.display(),
            scenario.steps.len()
        ));

        let outcomes = match self.execute_steps(scenario, audit) {
            Ok(outcomes) => outcomes,
            Err(e) => {
                self.transition(&scenario.name, ScenarioState::Failed);
                audit.record(&format!(
                    "SCENARIO ABORTED name={} reason={}",
                    scenario.name, e
                ));
                return Err(e);
            }
        };

        self.transition(&scenario.name, ScenarioState::Aggregating);
        let result = ScenarioResult {
            scenario: scenario.name.clone(),
            description: scenario.description.clone(),
            status: reduce_verdict(&outcomes),
            steps_executed: scenario.steps.len(),
            results: outcomes.iter().copied().collect::<OutcomeCounts>(),
        };

        log::info!("scenario '{}' verdict: {}", result.scenario, result.status);
        audit.record(&format!(
            "SCENARIO DONE name={} status={} allowed={} blocked={} challenged={} inconclusive={}",
            result.scenario,
            result.status,
            result.results.allowed,
            result.results.blocked,
            result.results.challenged,
            result.results.inconclusive
        ));
        self.transition(&scenario.name, ScenarioState::Done);
        Ok(result)
    }

    fn execute_steps(
        &mut self,
        scenario: &Scenario,
        audit: &mut dyn AuditSink,
    ) -> Result<Vec<Outcome>, EngineError> {
        let mut outcomes = Vec::new();
        let step_count = scenario.steps.len();

        for (step_index, step) in scenario.steps.iter().enumerate() {
            let url = self.config.url_for(&step.path);

            for attempt in 0..step.repeat {
                self.check_interrupt()?;
                // A signal may also land just after a completed wait.
                if !self.limiter.throttle() || self.interrupt.is_triggered() {
                    self.check_interrupt()?;
                }

                // Re-checked on every attempt, never cached.
                self.config.scope.enforce(&url, audit)?;

                let response = self.executor.execute(&ProbeRequest {
                    scenario: &scenario.name,
                    description: &scenario.description,
                    step_index,
                    attempt,
                    method: &step.method,
                    url: &url,
                    headers: &step.headers,
                    body: &step.body,
                    expected_codes: &step.expect_http_codes,
                })?;

                let outcome =
                    self.classifier
                        .classify(response.status, &response.body, &step.expect_http_codes);
                outcomes.push(outcome);

                audit.record(&format!(
                    "REQUEST scenario={} step={}/{} attempt={}/{} {} {} -> {:03} {} evidence={}",
                    scenario.name,
                    step_index + 1,
                    step_count,
                    attempt + 1,
                    step.repeat,
                    step.method,
                    url,
                    response.status,
                    outcome,
                    response.evidence_id
                ));

                if step.sleep_ms > 0 {
                    self.interrupt.sleep(Duration::from_millis(step.sleep_ms));
                }
            }
        }

        Ok(outcomes)
    }
}
