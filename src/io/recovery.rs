//! Append-only recovery log (`taskflow/.recovery.log`).
//!
//! Anything the workspace could not load or save lands here instead of
//! disappearing: discarded snapshots, failed writes with the unsaved JSON,
//! seed source failures and deleted tasks.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tempfile::NamedTempFile;

/// Upper bound on the log file (1 MB). An append that would cross it first
/// drops expired entries, then the oldest ones until half the bound is left.
const MAX_LOG_SIZE: u64 = 1_048_576;

/// Entries older than this many days are prunable
pub const PRUNE_AGE_DAYS: i64 = 30;

const FILE_HEADER: &str = "\
<!-- taskflow recovery log: data taskflow could not load or save.
     View with: tf recovery
     Prune old entries: tf recovery prune -->

---
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryCategory {
    /// A persisted snapshot was unreadable and ignored
    Snapshot,
    /// A snapshot write failed
    Write,
    /// The seed source failed
    Seed,
    /// A task was deleted
    Delete,
}

impl fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecoveryCategory::Snapshot => "snapshot",
            RecoveryCategory::Write => "write",
            RecoveryCategory::Seed => "seed",
            RecoveryCategory::Delete => "delete",
        })
    }
}

impl RecoveryCategory {
    pub fn parse_category(s: &str) -> Option<Self> {
        match s {
            "snapshot" => Some(RecoveryCategory::Snapshot),
            "write" => Some(RecoveryCategory::Write),
            "seed" => Some(RecoveryCategory::Seed),
            "delete" => Some(RecoveryCategory::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub body: String,
}

impl RecoveryEntry {
    pub fn new(category: RecoveryCategory, description: impl Into<String>) -> Self {
        RecoveryEntry {
            timestamp: Utc::now(),
            category,
            description: description.into(),
            fields: Vec::new(),
            body: String::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    fn to_markdown(&self) -> String {
        let mut out = format!(
            "## {} [{}] {}\n\n",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.category,
            self.description,
        );
        for (key, value) in &self.fields {
            out.push_str(&format!("{}: {}\n", key, value));
        }
        if !self.body.is_empty() {
            out.push_str("\n```json\n");
            out.push_str(&self.body);
            if !self.body.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("```\n");
        }
        out.push_str("\n---\n");
        out
    }

    pub fn to_json(&self) -> serde_json::Value {
        let fields: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        serde_json::json!({
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            "category": self.category.to_string(),
            "description": self.description,
            "fields": fields,
            "body": self.body,
        })
    }

    pub fn to_display_markdown(&self) -> String {
        self.to_markdown()
    }
}

pub fn recovery_log_path(dir: &Path) -> PathBuf {
    dir.join(".recovery.log")
}

/// Replace `path` with `content` via a temp file in the same directory
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Append an entry. Failures are reported on stderr and otherwise ignored.
pub fn log_recovery(dir: &Path, entry: RecoveryEntry) {
    if let Err(e) = append_entry(dir, &entry) {
        eprintln!("warning: could not write to recovery log: {}", e);
    }
}

fn append_entry(dir: &Path, entry: &RecoveryEntry) -> io::Result<()> {
    append_capped(dir, entry, MAX_LOG_SIZE)
}

fn append_capped(dir: &Path, entry: &RecoveryEntry, max_size: u64) -> io::Result<()> {
    let path = recovery_log_path(dir);
    let text = entry.to_markdown();
    if let Ok(meta) = std::fs::metadata(&path)
        && meta.len() + text.len() as u64 > max_size
    {
        let cutoff = Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS);
        let content = std::fs::read_to_string(&path)?;
        let unexpired = prune_entries_before(&content, &cutoff);
        let trimmed = drop_oldest_entries(&unexpired, (max_size / 2) as usize);
        atomic_write(&path, trimmed.as_bytes())?;
    }

    let needs_header = std::fs::metadata(&path).map_or(true, |m| m.len() == 0);
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    if needs_header {
        file.write_all(FILE_HEADER.as_bytes())?;
    }
    file.write_all(text.as_bytes())
}

/// Record a snapshot that failed to parse, keeping its raw text
pub fn log_discarded_snapshot(dir: &Path, key: &str, error: &str, raw: &str) {
    log_recovery(
        dir,
        RecoveryEntry::new(RecoveryCategory::Snapshot, "unreadable snapshot ignored")
            .field("Key", key)
            .field("Error", error)
            .body(raw),
    );
}

/// Record a failed snapshot write with the JSON that was not saved
pub fn log_failed_write(dir: &Path, key: &str, error: &str, unsaved: &str) {
    log_recovery(
        dir,
        RecoveryEntry::new(RecoveryCategory::Write, "snapshot write failed")
            .field("Key", key)
            .field("Error", error)
            .body(unsaved),
    );
}

pub fn log_seed_failure(dir: &Path, operation: &str, error: &str) {
    log_recovery(
        dir,
        RecoveryEntry::new(RecoveryCategory::Seed, format!("{} failed", operation))
            .field("Error", error),
    );
}

pub fn log_task_deletion(dir: &Path, project_id: &str, task_id: &str, task_json: &str) {
    log_recovery(
        dir,
        RecoveryEntry::new(RecoveryCategory::Delete, format!("task {} deleted", task_id))
            .field("Task", task_id)
            .field("Project", project_id)
            .body(task_json),
    );
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Entries, most recent first. `limit` keeps the newest `n`.
pub fn read_recovery_entries(
    dir: &Path,
    limit: Option<usize>,
    since: Option<DateTime<Utc>>,
) -> Vec<RecoveryEntry> {
    let Ok(content) = std::fs::read_to_string(recovery_log_path(dir)) else {
        return Vec::new();
    };
    let mut entries = parse_entries(&content);
    if let Some(since) = since {
        entries.retain(|e| e.timestamp >= since);
    }
    entries.reverse();
    if let Some(n) = limit {
        entries.truncate(n);
    }
    entries
}

fn parse_entries(content: &str) -> Vec<RecoveryEntry> {
    let mut entries = Vec::new();
    let mut current: Option<RecoveryEntry> = None;
    let mut body: Option<Vec<&str>> = None;

    for line in content.lines() {
        if let Some(lines) = body.as_mut() {
            if line == "```" {
                if let Some(entry) = current.as_mut() {
                    entry.body = lines.join("\n");
                }
                body = None;
            } else {
                lines.push(line);
            }
            continue;
        }
        if let Some(header) = line.strip_prefix("## ") {
            entries.extend(current.take());
            current = parse_entry_header(header).map(|(timestamp, category, description)| {
                RecoveryEntry {
                    timestamp,
                    category,
                    description,
                    fields: Vec::new(),
                    body: String::new(),
                }
            });
        } else if line == "---" {
            entries.extend(current.take());
        } else if line.starts_with("```") {
            body = Some(Vec::new());
        } else if let Some(entry) = current.as_mut()
            && let Some((key, value)) = line.split_once(": ")
        {
            entry.fields.push((key.to_string(), value.to_string()));
        }
    }
    entries.extend(current);
    entries
}

/// `<timestamp> [<category>] <description>`
fn parse_entry_header(header: &str) -> Option<(DateTime<Utc>, RecoveryCategory, String)> {
    let (timestamp, rest) = header.split_once(" [")?;
    let (category, description) = rest.split_once("] ")?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp).ok()?.with_timezone(&Utc);
    let category = RecoveryCategory::parse_category(category)?;
    Some((timestamp, category, description.to_string()))
}

// ---------------------------------------------------------------------------
// Pruning
// ---------------------------------------------------------------------------

/// Remove entries older than `before` (default: PRUNE_AGE_DAYS), or every
/// entry with `all`. Returns how many were removed.
pub fn prune_recovery(dir: &Path, before: Option<DateTime<Utc>>, all: bool) -> io::Result<usize> {
    let path = recovery_log_path(dir);
    if !path.exists() {
        return Ok(0);
    }
    let content = std::fs::read_to_string(&path)?;
    let original = parse_entries(&content).len();
    if all {
        atomic_write(&path, FILE_HEADER.as_bytes())?;
        return Ok(original);
    }
    let cutoff = before.unwrap_or_else(|| Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS));
    let trimmed = prune_entries_before(&content, &cutoff);
    let remaining = parse_entries(&trimmed).len();
    atomic_write(&path, trimmed.as_bytes())?;
    Ok(original - remaining)
}

/// Raw entry text after the file header, in file order, with each entry's
/// timestamp when its header line parses
fn entry_chunks(content: &str) -> Vec<(Option<DateTime<Utc>>, String)> {
    let body = content.split_once("\n---\n").map_or("", |(_, rest)| rest);
    let mut chunks: Vec<(Option<DateTime<Utc>>, String)> = Vec::new();
    for line in body.lines() {
        if let Some(header) = line.strip_prefix("## ") {
            let timestamp = parse_entry_header(header).map(|(ts, _, _)| ts);
            chunks.push((timestamp, String::new()));
        }
        if let Some((_, chunk)) = chunks.last_mut() {
            chunk.push_str(line);
            chunk.push('\n');
        }
    }
    chunks
}

fn prune_entries_before(content: &str, cutoff: &DateTime<Utc>) -> String {
    let mut out = String::from(FILE_HEADER);
    for (timestamp, chunk) in entry_chunks(content) {
        if timestamp.is_some_and(|ts| ts >= *cutoff) {
            out.push_str(&chunk);
        }
    }
    out
}

/// Drop entries from the front (the oldest appends) until the log fits in
/// `limit` bytes or only the header is left
fn drop_oldest_entries(content: &str, limit: usize) -> String {
    let chunks = entry_chunks(content);
    let mut size = FILE_HEADER.len() + chunks.iter().map(|(_, c)| c.len()).sum::<usize>();
    let mut out = String::from(FILE_HEADER);
    for (_, chunk) in chunks {
        if size > limit {
            size -= chunk.len();
            continue;
        }
        out.push_str(&chunk);
    }
    out
}
