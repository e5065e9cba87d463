// SPDX-License-Identifier: PMPL-1.0-or-later

//! Scenario definitions
//!
//! A scenario is an ordered list of request steps describing one attack
//! pattern. Scenarios are immutable once loaded.

mod loader;

pub use loader::{discover, load_scenario, parse_scenario};

use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub steps: Vec<Step>,
    pub source: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    /// Always at least 1
    pub repeat: u32,
    pub sleep_ms: u64,
    pub expect_http_codes: Vec<u16>,
}

impl Scenario {
    /// Total attempts this scenario will send
    pub fn planned_requests(&self) -> u64 {
        self.steps.iter().map(|s| u64::from(s.repeat)).sum()
    }
}
