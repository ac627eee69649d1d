//! Diagnostics: `tracing` setup and the refresh-cycle log.
//!
//! Every completed refresh cycle is appended as one JSON line to
//! `~/.hookdash/cycles.jsonl`. The log is best-effort: write failures are
//! ignored so a read-only home directory never breaks the dashboard.
//! `hookdash history` reads it back.

use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "HOOKDASH_LOG";

/// Install the stderr `tracing` subscriber.
///
/// `HOOKDASH_LOG` wins over `default_level`. Calling this twice is harmless.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

// ---------------------------------------------------------------------------
// Cycle log entry
// ---------------------------------------------------------------------------

/// One line of `cycles.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleLogEntry {
    pub timestamp: String,
    /// `"refresh"` or `"filter"`.
    pub kind: String,
    pub generation: u64,
    /// `"rendered"`, `"error"` or `"discarded"`.
    pub outcome: String,
    /// Error category when `outcome == "error"`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    /// Records rendered (total for summaries, filtered count for filters).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub records: Option<u64>,
    pub latency_ms: u64,
}

impl CycleLogEntry {
    /// A new entry stamped with the current time.
    pub fn now(kind: &str, generation: u64, outcome: &str, latency_ms: u64) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            kind: kind.to_string(),
            generation,
            outcome: outcome.to_string(),
            error_kind: None,
            message: None,
            records: None,
            latency_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Where cycle entries go.
#[derive(Debug, Clone, Default)]
pub enum CycleLog {
    /// Append to a JSONL file.
    File(PathBuf),
    /// Drop entries.
    #[default]
    Disabled,
}

impl CycleLog {
    /// The default `~/.hookdash/cycles.jsonl` sink, or `Disabled` when
    /// logging is turned off or there is no home directory.
    pub fn from_config(enabled: bool) -> Self {
        match cycle_log_path() {
            Some(path) if enabled => Self::File(path),
            _ => Self::Disabled,
        }
    }

    /// Append an entry. Best-effort.
    pub fn record(&self, entry: &CycleLogEntry) {
        if let Self::File(path) = self
            && let Err(e) = append_entry(path, entry)
        {
            tracing::debug!(error = %e, "could not write cycle log");
        }
    }
}

fn append_entry(path: &Path, entry: &CycleLogEntry) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let json = serde_json::to_string(entry)?;
    writeln!(file, "{json}")?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Read entries from a cycle log, oldest first.
///
/// Silently skips malformed lines. Returns an empty vec if the file does not
/// exist or cannot be read.
pub fn read_entries(path: &Path) -> Vec<CycleLogEntry> {
    let Ok(file) = fs::File::open(path) else {
        return Vec::new();
    };

    BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter_map(|line| serde_json::from_str::<CycleLogEntry>(&line).ok())
        .collect()
}

/// The newest `limit` entries, newest first.
pub fn read_recent(path: &Path, limit: usize) -> Vec<CycleLogEntry> {
    let mut entries = read_entries(path);
    entries.reverse();
    entries.truncate(limit);
    entries
}

/// Path to the cycle log file.
pub fn cycle_log_path() -> Option<PathBuf> {
    crate::config::data_dir().map(|dir| dir.join("cycles.jsonl"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
