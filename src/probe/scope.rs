// SPDX-License-Identifier: PMPL-1.0-or-later

//! Scope enforcement for outbound requests

use crate::audit::AuditSink;
use crate::error::{ConfigError, EngineError};
use regex::Regex;

/// Anchored URL pattern every outbound request must match
#[derive(Debug, Clone)]
pub struct ScopeGuard {
    pattern: String,
    regex: Regex,
}

impl ScopeGuard {
    /// Compile `pattern`. Matching is anchored at the start of the URL
    /// whether or not the pattern carries its own `^`.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        if pattern.trim().is_empty() {
            return Err(ConfigError::Missing("scope"));
        }
        let regex = Regex::new(&format!("^(?:{})", pattern)).map_err(|source| {
            ConfigError::InvalidScope {
                pattern: pattern.to_string(),
                source,
            }
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn check(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    /// Check `url` and record a violation in the audit trail on mismatch
    pub fn enforce(&self, url: &str, audit: &mut dyn AuditSink) -> Result<(), EngineError> {
        if self.check(url) {
            return Ok(());
        }
        log::error!("scope violation: {} does not match {}", url, self.pattern);
        audit.record(&format!(
            "SCOPE VIOLATION url={} pattern={} action=abort",
            url, self.pattern
        ));
        Err(EngineError::ScopeViolation {
            url: url.to_string(),
            pattern: self.pattern.clone(),
        })
    }
}
