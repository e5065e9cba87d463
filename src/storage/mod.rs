// SPDX-License-Identifier: PMPL-1.0-or-later

//! Evidence storage
//!
//! Every request attempt produces two write-once JSON records in the
//! evidence directory: `<id>.request.json` and `<id>.response.json`.
//! Record ids sort in issue order. The number of response records is the
//! authoritative request count for a run.

use crate::error::EngineError;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const REQUEST_SUFFIX: &str = ".request.json";
pub const RESPONSE_SUFFIX: &str = ".response.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

/// Outbound half of an exchange, written before the request is sent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEvidence {
    pub id: String,
    pub scenario: String,
    pub description: String,
    pub step_index: usize,
    pub attempt: u32,
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub expected_codes: Vec<u16>,
    pub issued_at: DateTime<Utc>,
}

/// How a response body is stored in its record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    #[default]
    Utf8,
    Base64,
}

/// Inbound half of an exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEvidence {
    pub id: String,
    pub status: u16,
    pub headers: Vec<HeaderEntry>,
    pub body: String,
    #[serde(default)]
    pub body_encoding: BodyEncoding,
    pub body_bytes: u64,
    pub body_truncated: bool,
    pub body_sha256: String,
    pub received_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_error: Option<String>,
}

/// Encode raw body bytes for storage: text when valid UTF-8, otherwise
/// base64 so the exact bytes survive.
pub fn encode_body(bytes: &[u8]) -> (String, BodyEncoding) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), BodyEncoding::Utf8),
        Err(_) => (
            base64::engine::general_purpose::STANDARD.encode(bytes),
            BodyEncoding::Base64,
        ),
    }
}

impl ResponseEvidence {
    /// The exact body bytes as received (after truncation)
    pub fn raw_body(&self) -> Result<Vec<u8>, base64::DecodeError> {
        match self.body_encoding {
            BodyEncoding::Utf8 => Ok(self.body.clone().into_bytes()),
            BodyEncoding::Base64 => base64::engine::general_purpose::STANDARD.decode(&self.body),
        }
    }

    /// Body as text for classification; invalid sequences are replaced
    pub fn body_text(&self) -> String {
        match self.body_encoding {
            BodyEncoding::Utf8 => self.body.clone(),
            BodyEncoding::Base64 => match self.raw_body() {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    log::warn!("response record {} has an undecodable body: {}", self.id, e);
                    String::new()
                }
            },
        }
    }
}

/// A request record paired with its response, if one was written
#[derive(Debug, Clone)]
pub struct Exchange {
    pub request: RequestEvidence,
    pub response: Option<ResponseEvidence>,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Append-only writer for one evidence directory
#[derive(Debug)]
pub struct EvidenceStore {
    dir: PathBuf,
    pid: u32,
    seq: u64,
}

impl EvidenceStore {
    pub fn open(dir: &Path) -> Result<Self, EngineError> {
        fs::create_dir_all(dir).map_err(|e| {
            EngineError::evidence(format!("creating evidence directory {}", dir.display()), e)
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            pid: std::process::id(),
            seq: 0,
        })
    }

    /// Allocate a fresh record id: timestamp, process, sequence, random
    pub fn next_id(&mut self) -> String {
        self.seq += 1;
        let mut random = [0u8; 4];
        if let Err(e) = getrandom::getrandom(&mut random) {
            log::warn!("getrandom failed ({}); evidence id relies on sequence only", e);
        }
        format!(
            "{}-{}-{:06}-{}",
            Utc::now().format("%Y%m%dT%H%M%S%.6fZ"),
            self.pid,
            self.seq,
            hex::encode(random)
        )
    }

    pub fn write_request(&self, record: &RequestEvidence) -> Result<PathBuf, EngineError> {
        self.write_once(&record.id, REQUEST_SUFFIX, record)
    }

    pub fn write_response(&self, record: &ResponseEvidence) -> Result<PathBuf, EngineError> {
        self.write_once(&record.id, RESPONSE_SUFFIX, record)
    }

    fn write_once<T: Serialize>(
        &self,
        id: &str,
        suffix: &str,
        record: &T,
    ) -> Result<PathBuf, EngineError> {
        let path = self.dir.join(format!("{}{}", id, suffix));
        let payload = serde_json::to_vec_pretty(record).map_err(|e| {
            EngineError::evidence(format!("serializing {}", path.display()), e.into())
        })?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| EngineError::evidence(format!("creating {}", path.display()), e))?;
        file.write_all(&payload)
            .and_then(|_| file.sync_all())
            .map_err(|e| EngineError::evidence(format!("writing {}", path.display()), e))?;
        Ok(path)
    }
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.ends_with(suffix))
        .unwrap_or(false)
}

fn files_with_suffix(dir: &Path, suffix: &str) -> std::io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_suffix(path, suffix))
        .collect();
    entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(entries)
}

/// Count response records on disk. A missing directory counts as zero.
pub fn count_responses(dir: &Path) -> Result<usize, EngineError> {
    files_with_suffix(dir, RESPONSE_SUFFIX)
        .map(|files| files.len())
        .map_err(|e| EngineError::evidence(format!("scanning {}", dir.display()), e))
}

fn read_record<T: for<'de> Deserialize<'de>>(path: &Path) -> anyhow::Result<T> {
    use anyhow::Context;
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Load every request record with its matching response, in issue order.
/// Unreadable records are logged and skipped.
pub fn load_exchanges(dir: &Path) -> Result<Vec<Exchange>, EngineError> {
    let scan_err = |e| EngineError::evidence(format!("scanning {}", dir.display()), e);

    let mut responses: HashMap<String, ResponseEvidence> = HashMap::new();
    for path in files_with_suffix(dir, RESPONSE_SUFFIX).map_err(scan_err)? {
        match read_record::<ResponseEvidence>(&path) {
            Ok(record) => {
                responses.insert(record.id.clone(), record);
            }
            Err(e) => log::warn!("skipping unreadable response record: {:#}", e),
        }
    }

    let mut exchanges = Vec::new();
    for path in files_with_suffix(dir, REQUEST_SUFFIX).map_err(scan_err)? {
        match read_record::<RequestEvidence>(&path) {
            Ok(request) => {
                let response = responses.remove(&request.id);
                exchanges.push(Exchange { request, response });
            }
            Err(e) => log::warn!("skipping unreadable request record: {:#}", e),
        }
    }

    for orphan in responses.keys() {
        log::warn!("response record {} has no matching request record", orphan);
    }

    Ok(exchanges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str) -> RequestEvidence {
        RequestEvidence {
            id: id.to_string(),
            scenario: "sqli".into(),
            description: "union select".into(),
            step_index: 0,
            attempt: 0,
            method: "GET".into(),
            url: "https://a.test/?id=1".into(),
            headers: BTreeMap::new(),
            body: String::new(),
            expected_codes: vec![403],
            issued_at: Utc::now(),
        }
    }

    fn response(id: &str, status: u16) -> ResponseEvidence {
        ResponseEvidence {
            id: id.to_string(),
            status,
            headers: vec![],
            body: "denied".into(),
            body_encoding: BodyEncoding::Utf8,
            body_bytes: 6,
            body_truncated: false,
            body_sha256: sha256_hex(b"denied"),
            received_at: Utc::now(),
            elapsed_ms: 3,
            transport_error: None,
        }
    }

    #[test]
    fn ids_are_unique_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = EvidenceStore::open(dir.path()).unwrap();
        let ids: Vec<String> = (0..50).map(|_| store.next_id()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
        assert_eq!(sorted, ids);
    }

    #[test]
    fn records_are_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = EvidenceStore::open(dir.path()).unwrap();
        store.write_request(&request("a")).unwrap();
        let err = store.write_request(&request("a")).unwrap_err();
        assert!(matches!(err, EngineError::Evidence { .. }));
    }

    #[test]
    fn counts_only_response_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = EvidenceStore::open(dir.path()).unwrap();
        store.write_request(&request("a")).unwrap();
        store.write_response(&response("a", 403)).unwrap();
        store.write_request(&request("b")).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        assert_eq!(count_responses(dir.path()).unwrap(), 1);
        assert_eq!(count_responses(&dir.path().join("missing")).unwrap(), 0);
    }

    #[test]
    fn pairs_exchanges_in_id_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = EvidenceStore::open(dir.path()).unwrap();
        for id in ["002", "001"] {
            store.write_request(&request(id)).unwrap();
        }
        store.write_response(&response("001", 200)).unwrap();

        let exchanges = load_exchanges(dir.path()).unwrap();
        assert_eq!(exchanges.len(), 2);
        assert_eq!(exchanges[0].request.id, "001");
        assert_eq!(exchanges[0].response.as_ref().map(|r| r.status), Some(200));
        assert!(exchanges[1].response.is_none());
    }

    #[test]
    fn binary_bodies_survive_a_disk_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = EvidenceStore::open(dir.path()).unwrap();
        let raw = [0x1f, 0x8b, 0xff, b'o', b'k', 0x00];
        let (body, body_encoding) = encode_body(&raw);
        assert_eq!(body_encoding, BodyEncoding::Base64);

        store.write_request(&request("bin")).unwrap();
        store
            .write_response(&ResponseEvidence {
                body,
                body_encoding,
                body_bytes: raw.len() as u64,
                body_sha256: sha256_hex(&raw),
                ..response("bin", 200)
            })
            .unwrap();

        let exchanges = load_exchanges(dir.path()).unwrap();
        let recorded = exchanges[0].response.as_ref().unwrap();
        let bytes = recorded.raw_body().unwrap();
        assert_eq!(bytes, raw.to_vec());
        assert_eq!(sha256_hex(&bytes), recorded.body_sha256);
        assert!(recorded.body_text().contains("ok"));
    }

    #[test]
    fn text_bodies_stay_readable() {
        assert_eq!(
            encode_body("Access Denied".as_bytes()),
            ("Access Denied".to_string(), BodyEncoding::Utf8)
        );
        let legacy = r#"{"id":"x","status":403,"headers":[],"body":"waf","body_bytes":3,
            "body_truncated":false,"body_sha256":"","received_at":"2026-01-01T00:00:00Z",
            "elapsed_ms":1}"#;
        let parsed: ResponseEvidence = serde_json::from_str(legacy).unwrap();
        assert_eq!(parsed.body_encoding, BodyEncoding::Utf8);
        assert_eq!(parsed.body_text(), "waf");
    }
}
