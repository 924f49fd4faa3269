//! On-disk session index discovery.
//!
//! The agent CLI owns its session store; the supervisor only reads a
//! discovery index for the `list` operation. Two externally owned layouts
//! exist: a single append-only JSONL history file, and a date-partitioned
//! tree whose per-session files open with an init-like entry carrying the
//! id. Both are parsed defensively: malformed rows are skipped, absent or
//! unreadable paths read as empty.

use std::fs;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::debug;

use crate::agent::policy::IndexLayout;

/// One discovered session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub session_id: String,
    /// Project directory recorded by the agent.
    pub project: Option<String>,
    /// Human-readable label (usually the first prompt).
    pub display: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Read every discoverable session for a layout.
#[must_use]
pub fn read_index(layout: &IndexLayout) -> Vec<IndexEntry> {
    match layout {
        IndexLayout::JsonlFile(path) => read_jsonl_file(path),
        IndexLayout::DateTree(root) => read_date_tree(root),
    }
}

/// Parse a `{timestamp, project, display, session_id}` JSONL history file.
fn read_jsonl_file(path: &Path) -> Vec<IndexEntry> {
    let Ok(contents) = fs::read_to_string(path) else {
        debug!(path = %path.display(), "session index file absent or unreadable");
        return Vec::new();
    };

    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let row: Value = serde_json::from_str(line).ok()?;
            let session_id = row.get("session_id").and_then(|v| v.as_str())?;
            Some(IndexEntry {
                session_id: session_id.to_owned(),
                project: string_field(&row, &["project", "cwd"]),
                display: string_field(&row, &["display"]),
                timestamp: parse_timestamp(row.get("timestamp")).unwrap_or_default(),
            })
        })
        .collect()
}

/// Walk a `root/YYYY/MM/DD/<name>.jsonl` tree; the first line of each file
/// is an init-like entry carrying the session id.
fn read_date_tree(root: &Path) -> Vec<IndexEntry> {
    let mut entries = Vec::new();
    for day_dir in walk_levels(root, 3) {
        let Ok(files) = fs::read_dir(&day_dir) else {
            continue;
        };
        for file in files.flatten() {
            let path = file.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            if let Some(entry) = read_tree_file(&path) {
                entries.push(entry);
            }
        }
    }
    entries
}

/// Descend `levels` directory levels below `root`, returning the leaves.
fn walk_levels(root: &Path, levels: usize) -> Vec<std::path::PathBuf> {
    let mut current = vec![root.to_path_buf()];
    for _ in 0..levels {
        let mut next = Vec::new();
        for dir in &current {
            let Ok(children) = fs::read_dir(dir) else {
                continue;
            };
            for child in children.flatten() {
                let path = child.path();
                if path.is_dir() {
                    next.push(path);
                }
            }
        }
        current = next;
    }
    current
}

fn read_tree_file(path: &Path) -> Option<IndexEntry> {
    let contents = fs::read_to_string(path).ok()?;
    let first_line = contents.lines().find(|l| !l.trim().is_empty())?;
    let row: Value = serde_json::from_str(first_line).ok()?;

    // The id lives either at the top level or under a payload wrapper.
    let session_id = row
        .get("session_id")
        .or_else(|| row.get("id"))
        .or_else(|| row.pointer("/payload/id"))
        .and_then(|v| v.as_str())?
        .to_owned();

    let project = string_field(&row, &["project", "cwd"]).or_else(|| {
        row.pointer("/payload/cwd")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
    });

    let timestamp = parse_timestamp(row.get("timestamp"))
        .or_else(|| parse_timestamp(row.pointer("/payload/timestamp")))
        .or_else(|| file_mtime(path))
        .unwrap_or_default();

    Some(IndexEntry {
        session_id,
        project,
        display: string_field(&row, &["display"]),
        timestamp,
    })
}

fn string_field(row: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| row.get(k).and_then(|v| v.as_str()))
        .map(str::to_owned)
}

/// Timestamps appear as RFC 3339 strings, epoch seconds, or epoch millis.
fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => {
            let n = n.as_i64()?;
            // Heuristic: values past the year ~2600 in seconds are millis.
            let (secs, millis) = if n > 20_000_000_000 {
                (n / 1000, n % 1000)
            } else {
                (n, 0)
            };
            Utc.timestamp_opt(secs, u32::try_from(millis).ok()? * 1_000_000)
                .single()
        }
        _ => None,
    }
}

fn file_mtime(path: &Path) -> Option<DateTime<Utc>> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}
