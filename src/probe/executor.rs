// SPDX-License-Identifier: PMPL-1.0-or-later

//! Request execution with evidence capture

use crate::error::EngineError;
use crate::storage::{
    encode_body, sha256_hex, EvidenceStore, HeaderEntry, RequestEvidence, ResponseEvidence,
};
use crate::types::{FRAMEWORK_NAME, FRAMEWORK_VERSION, TRANSPORT_FAILURE_STATUS};
use chrono::Utc;
use std::collections::BTreeMap;
use std::io::Read;
use std::time::{Duration, Instant};
use ureq::http;

/// Response bodies beyond this size are truncated in evidence and
/// classification.
pub const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Sent on every request unless a step sets its own User-Agent
pub fn default_user_agent() -> String {
    format!("{}/{}", FRAMEWORK_NAME, FRAMEWORK_VERSION)
}

/// One attempt to send, plus the context recorded alongside it
#[derive(Debug, Clone)]
pub struct ProbeRequest<'a> {
    pub scenario: &'a str,
    pub description: &'a str,
    pub step_index: usize,
    pub attempt: u32,
    pub method: &'a str,
    pub url: &'a str,
    pub headers: &'a BTreeMap<String, String>,
    pub body: &'a str,
    pub expected_codes: &'a [u16],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
    pub evidence_id: String,
}

impl ProbeResponse {
    pub fn is_transport_failure(&self) -> bool {
        self.status == TRANSPORT_FAILURE_STATUS
    }
}

struct Received {
    status: u16,
    headers: Vec<HeaderEntry>,
    body: Vec<u8>,
    truncated: bool,
    error: Option<String>,
}

impl Received {
    fn failed(error: String) -> Self {
        Self {
            status: TRANSPORT_FAILURE_STATUS,
            headers: Vec::new(),
            body: Vec::new(),
            truncated: false,
            error: Some(error),
        }
    }
}

/// Headers as they go on the wire, lowercased.
///
/// `sent` is set explicitly on the request so the HTTP layer adds none of
/// its own defaults. `recorded` also carries the headers that layer derives
/// from the URL and body (`host`, `content-length`).
struct OutboundHeaders {
    sent: BTreeMap<String, String>,
    recorded: BTreeMap<String, String>,
}

fn outbound_headers(request: &ProbeRequest<'_>, user_agent: &str) -> OutboundHeaders {
    let mut sent = BTreeMap::new();
    sent.insert("user-agent".to_string(), user_agent.to_string());
    sent.insert("accept".to_string(), "*/*".to_string());
    // Identity keeps the recorded body byte-exact with what the WAF served.
    sent.insert("accept-encoding".to_string(), "identity".to_string());
    for (name, value) in request.headers {
        sent.insert(name.to_ascii_lowercase(), value.clone());
    }

    let mut recorded = sent.clone();
    if !recorded.contains_key("host") {
        if let Ok(url) = url::Url::parse(request.url) {
            if let Some(host) = url.host_str() {
                let host = match url.port() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host.to_string(),
                };
                recorded.insert("host".to_string(), host);
            }
        }
    }
    if !request.body.is_empty() && !recorded.contains_key("content-length") {
        recorded.insert("content-length".to_string(), request.body.len().to_string());
    }

    OutboundHeaders { sent, recorded }
}

/// Sends requests one at a time and writes request/response evidence.
/// The caller must have passed the URL through the scope guard.
pub struct RequestExecutor {
    agent: ureq::Agent,
    store: EvidenceStore,
    user_agent: String,
    body_limit: u64,
}

impl RequestExecutor {
    pub fn new(store: EvidenceStore, timeout: Duration) -> Self {
        // Redirects are never followed: the redirect target has not been
        // scope-checked.
        let agent = ureq::config::Config::builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .max_redirects(0)
            .build()
            .new_agent();
        Self {
            agent,
            store,
            user_agent: default_user_agent(),
            body_limit: MAX_BODY_BYTES,
        }
    }

    /// Override the response body cap
    pub fn with_body_limit(mut self, limit: u64) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn execute(&mut self, request: &ProbeRequest<'_>) -> Result<ProbeResponse, EngineError> {
        let headers = outbound_headers(request, &self.user_agent);
        let id = self.store.next_id();
        self.store.write_request(&RequestEvidence {
            id: id.clone(),
            scenario: request.scenario.to_string(),
            description: request.description.to_string(),
            step_index: request.step_index,
            attempt: request.attempt,
            method: request.method.to_string(),
            url: request.url.to_string(),
            headers: headers.recorded,
            body: request.body.to_string(),
            expected_codes: request.expected_codes.to_vec(),
            issued_at: Utc::now(),
        })?;

        let started = Instant::now();
        let received = self.send(request, &headers.sent);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if let Some(error) = &received.error {
            log::warn!(
                "{} {} -> {:03} ({})",
                request.method,
                request.url,
                received.status,
                error
            );
        } else {
            log::debug!("{} {} -> {}", request.method, request.url, received.status);
        }

        let (stored_body, body_encoding) = encode_body(&received.body);
        self.store.write_response(&ResponseEvidence {
            id: id.clone(),
            status: received.status,
            headers: received.headers,
            body: stored_body,
            body_encoding,
            body_bytes: received.body.len() as u64,
            body_truncated: received.truncated,
            body_sha256: sha256_hex(&received.body),
            received_at: Utc::now(),
            elapsed_ms,
            transport_error: received.error,
        })?;

        Ok(ProbeResponse {
            status: received.status,
            body: String::from_utf8_lossy(&received.body).into_owned(),
            evidence_id: id,
        })
    }

    fn send(&self, request: &ProbeRequest<'_>, headers: &BTreeMap<String, String>) -> Received {
        let mut builder = http::Request::builder()
            .method(request.method)
            .uri(request.url);
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let outcome = if request.body.is_empty() {
            builder.body(()).map(|req| self.agent.run(req))
        } else {
            builder
                .body(request.body.as_bytes())
                .map(|req| self.agent.run(req))
        };

        let response = match outcome {
            Err(e) => return Received::failed(format!("invalid request: {}", e)),
            Ok(Err(e)) => return Received::failed(e.to_string()),
            Ok(Ok(response)) => response,
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| HeaderEntry {
                name: name.as_str().to_string(),
                value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            })
            .collect();

        let mut body = response.into_body();
        let mut bytes = Vec::new();
        let error = body
            .as_reader()
            .take(self.body_limit.saturating_add(1))
            .read_to_end(&mut bytes)
            .err()
            .map(|e| format!("reading response body: {}", e));

        let truncated = bytes.len() as u64 > self.body_limit;
        if truncated {
            bytes.truncate(self.body_limit as usize);
            log::warn!(
                "response body from {} exceeded {} bytes and was truncated",
                request.url,
                self.body_limit
            );
        }

        Received {
            status,
            headers,
            body: bytes,
            truncated,
            error,
        }
    }
}
