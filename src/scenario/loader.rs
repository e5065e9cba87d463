// SPDX-License-Identifier: PMPL-1.0-or-later

//! Scenario file parsing, validation and discovery

use super::{Scenario, Step};
use crate::error::ScenarioError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const SCENARIO_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

#[derive(Debug, Deserialize)]
struct ScenarioDoc {
    name: Option<String>,
    description: Option<String>,
    steps: Option<Vec<StepDoc>>,
}

#[derive(Debug, Deserialize)]
struct StepDoc {
    #[serde(default = "default_method")]
    method: String,
    #[serde(default = "default_path")]
    path: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    body: String,
    #[serde(default = "default_repeat")]
    repeat: u32,
    #[serde(default)]
    sleep_ms: u64,
    #[serde(default)]
    expect_http_codes: Vec<u16>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

fn default_repeat() -> u32 {
    1
}

enum Format {
    Json,
    Yaml,
}

fn format_for(path: &Path) -> Option<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Some(Format::Json),
        Some("yaml") | Some("yml") => Some(Format::Yaml),
        _ => None,
    }
}

/// Read and validate one scenario file
pub fn load_scenario(path: &Path) -> Result<Scenario, ScenarioError> {
    let content = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_scenario(path, &content)
}

/// Validate scenario `content`; `path` selects the format by extension
pub fn parse_scenario(path: &Path, content: &str) -> Result<Scenario, ScenarioError> {
    let parse_err = |message: String| ScenarioError::Parse {
        path: path.to_path_buf(),
        message,
    };
    let doc: ScenarioDoc = match format_for(path) {
        Some(Format::Json) => serde_json::from_str(content).map_err(|e| parse_err(e.to_string()))?,
        Some(Format::Yaml) => serde_yaml::from_str(content).map_err(|e| parse_err(e.to_string()))?,
        None => return Err(ScenarioError::UnsupportedFormat(path.to_path_buf())),
    };

    let missing = |field| ScenarioError::MissingField {
        path: path.to_path_buf(),
        field,
    };
    let name = doc
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| missing("name"))?;
    let description = doc.description.ok_or_else(|| missing("description"))?;
    let raw_steps = doc.steps.ok_or_else(|| missing("steps"))?;

    let steps: Vec<Step> = raw_steps
        .into_iter()
        .enumerate()
        .filter_map(|(index, step)| build_step(&name, index, step))
        .collect();

    if steps.is_empty() {
        return Err(ScenarioError::NoSteps(path.to_path_buf()));
    }

    Ok(Scenario {
        name,
        description,
        steps,
        source: path.to_path_buf(),
    })
}

fn build_step(scenario: &str, index: usize, doc: StepDoc) -> Option<Step> {
    let method = doc.method.trim().to_ascii_uppercase();
    let path = doc.path.trim().to_string();
    if method.is_empty() || path.is_empty() {
        log::warn!(
            "scenario '{}': skipping step {} with empty method or path",
            scenario,
            index + 1
        );
        return None;
    }

    let repeat = if doc.repeat == 0 {
        log::warn!(
            "scenario '{}': step {} has repeat 0, running it once",
            scenario,
            index + 1
        );
        1
    } else {
        doc.repeat
    };

    let path = if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    };

    Some(Step {
        method,
        path,
        headers: doc.headers,
        body: doc.body,
        repeat,
        sleep_ms: doc.sleep_ms,
        expect_http_codes: doc.expect_http_codes,
    })
}

/// Scenario files under `root` in lexical path order. A file argument is
/// returned as-is.
pub fn discover(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.is_dir() {
        anyhow::bail!("scenario directory not found: {}", root.display());
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    for entry in WalkDir::new(root).max_depth(max_depth) {
        let entry =
            entry.with_context(|| format!("walking scenario directory {}", root.display()))?;
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| SCENARIO_EXTENSIONS.contains(&ext))
            .unwrap_or(false);
        if entry.file_type().is_file() && supported {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}
