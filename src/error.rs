// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error taxonomy
//!
//! Configuration errors and scope violations are fatal to a run. Scenario
//! errors only ever fail the scenario they belong to. Transport failures
//! are not errors at all; they become `INCONCLUSIVE` attempts.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid target url '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("invalid scope pattern '{pattern}': {source}")]
    InvalidScope {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("target '{target}' is outside the configured scope '{pattern}'")]
    TargetOutOfScope { target: String, pattern: String },

    #[error("settings file {path}: {message}")]
    Settings { path: PathBuf, message: String },
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("reading scenario {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing scenario {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unsupported scenario extension for {0}")]
    UnsupportedFormat(PathBuf),

    #[error("scenario {path} is missing required field '{field}'")]
    MissingField { path: PathBuf, field: &'static str },

    #[error("scenario {0} has no executable steps")]
    NoSteps(PathBuf),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("scope violation: refusing to send request to {url} (scope: {pattern})")]
    ScopeViolation { url: String, pattern: String },

    #[error("evidence store: {context}: {source}")]
    Evidence {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("interrupted by signal {signal}")]
    Interrupted { signal: i32 },
}

impl EngineError {
    pub(crate) fn evidence(context: impl Into<String>, source: std::io::Error) -> Self {
        EngineError::Evidence {
            context: context.into(),
            source,
        }
    }

    /// Conventional process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Interrupted { signal } => 128 + signal,
            _ => 1,
        }
    }
}
