// SPDX-License-Identifier: PMPL-1.0-or-later

//! Attempt classification
//!
//! Precedence, first match wins:
//! 1. 403, 406, 418 -> BLOCKED
//! 2. 429, 503 -> CHALLENGED
//! 3. 200, 201, 202, 204 -> CHALLENGED if the body carries a protection
//!    signature, otherwise ALLOWED
//! 4. no response (status 000) -> INCONCLUSIVE
//! 5. anything else -> BLOCKED if the scenario expected it, else INCONCLUSIVE

use crate::types::{Outcome, TRANSPORT_FAILURE_STATUS};

const DENIAL_CODES: [u16; 3] = [403, 406, 418];
const THROTTLE_CODES: [u16; 2] = [429, 503];
const SUCCESS_CODES: [u16; 4] = [200, 201, 202, 204];

/// Lowercase substrings that mark a success-status body as a block or
/// challenge page
pub const DEFAULT_BODY_SIGNATURES: [&str; 6] = [
    "access denied",
    "blocked",
    "firewall",
    "security",
    "waf",
    "captcha",
];

/// Classify one attempt with the default signature list
pub fn classify(status: u16, body: &str, expected: &[u16]) -> Outcome {
    ResultClassifier::default().classify(status, body, expected)
}

#[derive(Debug, Clone)]
pub struct ResultClassifier {
    signatures: Vec<String>,
}

impl Default for ResultClassifier {
    fn default() -> Self {
        Self {
            signatures: DEFAULT_BODY_SIGNATURES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ResultClassifier {
    /// Default signatures plus `extra`. The defaults are never removed.
    pub fn with_extra_signatures<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classifier = Self::default();
        for sig in extra {
            let sig = sig.as_ref().trim().to_lowercase();
            if !sig.is_empty() && !classifier.signatures.contains(&sig) {
                classifier.signatures.push(sig);
            }
        }
        classifier
    }

    pub fn signatures(&self) -> &[String] {
        &self.signatures
    }

    pub fn classify(&self, status: u16, body: &str, expected: &[u16]) -> Outcome {
        if DENIAL_CODES.contains(&status) {
            return Outcome::Blocked;
        }
        if THROTTLE_CODES.contains(&status) {
            return Outcome::Challenged;
        }
        if SUCCESS_CODES.contains(&status) {
            return if self.has_signature(body) {
                Outcome::Challenged
            } else {
                Outcome::Allowed
            };
        }
        if status == TRANSPORT_FAILURE_STATUS {
            return Outcome::Inconclusive;
        }
        if expected.contains(&status) {
            Outcome::Blocked
        } else {
            Outcome::Inconclusive
        }
    }

    fn has_signature(&self, body: &str) -> bool {
        let body = body.to_lowercase();
        self.signatures.iter().any(|sig| body.contains(sig.as_str()))
    }
}
