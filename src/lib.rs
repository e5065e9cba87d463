// SPDX-License-Identifier: PMPL-1.0-or-later

//! waf-assay — scenario-driven web application firewall assessment.
//!
//! Declarative attack scenarios are replayed against a single authorized
//! target to measure whether the protection layer blocks, allows or
//! challenges each pattern.
//!
//! ENGINE PILLARS:
//! 1. **Probe**: scope-checked, rate-limited, strictly sequential HTTP
//!    requests with full request/response evidence on disk.
//! 2. **Classify**: a fixed-precedence policy mapping each response to
//!    BLOCKED / ALLOWED / CHALLENGED / INCONCLUSIVE, reduced per scenario
//!    with a single leak dominating.
//! 3. **Report**: structured JSON and narrative Markdown, with request
//!    totals always recounted from the evidence trail.

pub mod audit;
pub mod campaign;
pub mod classify;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod probe;
pub mod recover;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod storage;
pub mod types;
