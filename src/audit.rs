// SPDX-License-Identifier: PMPL-1.0-or-later

//! Audit trail sink
//!
//! Entries are free text; the sink adds the timestamp. The file sink is
//! append-only and flushes every entry so that an interrupted run still
//! leaves a complete trail.

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub trait AuditSink {
    fn record(&mut self, entry: &str);
}

/// Timestamped, append-only audit log file
pub struct AuditLog {
    path: PathBuf,
    file: File,
}

impl AuditLog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating audit directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening audit log {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for AuditLog {
    fn record(&mut self, entry: &str) {
        let line = format!("[{}] {}\n", Utc::now().to_rfc3339(), entry);
        if let Err(e) = self
            .file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.flush())
        {
            log::error!("failed to write audit entry to {}: {}", self.path.display(), e);
        }
    }
}

/// In-memory sink, used where no audit file is wanted
#[derive(Debug, Default, Clone)]
pub struct MemoryAudit {
    pub entries: Vec<String>,
}

impl AuditSink for MemoryAudit {
    fn record(&mut self, entry: &str) {
        self.entries.push(entry.to_string());
    }
}
