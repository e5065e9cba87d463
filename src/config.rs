// SPDX-License-Identifier: PMPL-1.0-or-later

//! Run configuration
//!
//! Settings come from an optional YAML/JSON file and from the command line
//! (which wins). They are resolved once into an immutable [`RunConfig`]
//! that every component receives explicitly.

use crate::error::ConfigError;
use crate::probe::ScopeGuard;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_RATE_LIMIT: u32 = 5;
pub const DEFAULT_CONCURRENCY: u32 = 1;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_OUTPUT_DIR: &str = "reports";

pub const EVIDENCE_DIR_NAME: &str = "evidence";
pub const AUDIT_LOG_NAME: &str = "audit.log";
pub const REPORT_JSON_NAME: &str = "report.json";
pub const REPORT_MARKDOWN_NAME: &str = "report.md";

/// Unresolved settings, every field optional so layers can be merged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub target: Option<String>,
    pub scope: Option<String>,
    pub rate_limit: Option<u32>,
    pub concurrency: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub extra_signatures: Vec<String>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings_error = |message: String| ConfigError::Settings {
            path: path.to_path_buf(),
            message,
        };
        let content = fs::read_to_string(path).map_err(|e| settings_error(e.to_string()))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|e| settings_error(e.to_string())),
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| settings_error(e.to_string()))
            }
            _ => Err(settings_error("unsupported extension (expected json, yaml or yml)".into())),
        }
    }

    /// Layer `overrides` on top of `self`. Signature lists are concatenated.
    pub fn merge(self, overrides: Settings) -> Settings {
        let mut extra_signatures = self.extra_signatures;
        extra_signatures.extend(overrides.extra_signatures);
        Settings {
            target: overrides.target.or(self.target),
            scope: overrides.scope.or(self.scope),
            rate_limit: overrides.rate_limit.or(self.rate_limit),
            concurrency: overrides.concurrency.or(self.concurrency),
            timeout_secs: overrides.timeout_secs.or(self.timeout_secs),
            output_dir: overrides.output_dir.or(self.output_dir),
            extra_signatures,
        }
    }
}

/// Fully validated, immutable configuration for one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub target: String,
    pub scope: ScopeGuard,
    pub rate_limit: u32,
    pub concurrency: u32,
    pub timeout: Duration,
    pub output_dir: PathBuf,
    pub extra_signatures: Vec<String>,
}

impl RunConfig {
    pub fn resolve(settings: Settings) -> Result<Self, ConfigError> {
        let target = normalize_target(settings.target.ok_or(ConfigError::Missing("target"))?)?;
        let pattern = settings.scope.ok_or(ConfigError::Missing("scope"))?;
        let scope = ScopeGuard::new(&pattern)?;

        if !scope.check(&join_url(&target, "/")) {
            return Err(ConfigError::TargetOutOfScope {
                target,
                pattern: scope.pattern().to_string(),
            });
        }

        let concurrency = settings.concurrency.unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency > 1 {
            log::warn!(
                "concurrency = {} requested; execution is strictly sequential and the setting has no effect",
                concurrency
            );
        }

        Ok(RunConfig {
            target,
            scope,
            rate_limit: settings.rate_limit.unwrap_or(DEFAULT_RATE_LIMIT),
            concurrency,
            timeout: Duration::from_secs(settings.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            output_dir: settings
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            extra_signatures: settings
                .extra_signatures
                .into_iter()
                .filter(|s| !s.trim().is_empty())
                .collect(),
        })
    }

    /// Absolute URL for a step path. The path is appended verbatim so that
    /// attack payloads reach the target exactly as written.
    pub fn url_for(&self, path: &str) -> String {
        join_url(&self.target, path)
    }

    pub fn evidence_dir(&self) -> PathBuf {
        self.output_dir.join(EVIDENCE_DIR_NAME)
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.output_dir.join(AUDIT_LOG_NAME)
    }

    pub fn report_json_path(&self) -> PathBuf {
        self.output_dir.join(REPORT_JSON_NAME)
    }

    pub fn report_markdown_path(&self) -> PathBuf {
        self.output_dir.join(REPORT_MARKDOWN_NAME)
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

fn normalize_target(raw: String) -> Result<String, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidTarget {
        url: raw.clone(),
        reason: reason.to_string(),
    };
    let parsed = url::Url::parse(&raw).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(raw.trim_end_matches('/').to_string())
}
