//! Text dumps of the log history
//!
//! A dump is a plain-text report: a header, per-level statistics, every
//! retained record in complex form, and the raw console output.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

use crate::config::LoggerConfig;
use crate::error::ExportError;
use crate::logging::{LogLevel, LogRecord};

use super::state::LogSnapshot;

/// Per-level record counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogStatistics {
    pub total: usize,
    counts: [usize; LogLevel::ALL.len()],
}

fn level_index(level: LogLevel) -> usize {
    match level {
        LogLevel::Fatal => 0,
        LogLevel::Error => 1,
        LogLevel::Warn => 2,
        LogLevel::Info => 3,
        LogLevel::Success => 4,
        LogLevel::Working => 5,
        LogLevel::Debug => 6,
    }
}

impl LogStatistics {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a LogRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.total += 1;
            stats.counts[level_index(record.level)] += 1;
        }
        stats
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.counts[level_index(level)]
    }

    /// Share of records at `level`, in percent
    ///
    /// An empty history divides by one, so every level reports 0.
    pub fn percent(&self, level: LogLevel) -> f64 {
        let divisor = self.total.max(1) as f64;
        self.count(level) as f64 / divisor * 100.0
    }
}

fn stats_label(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Fatal => "Fatal Error",
        other => other.as_str(),
    }
}

/// Build the dump text for a snapshot
pub fn render_dump(config: &LoggerConfig, snapshot: &LogSnapshot, at: DateTime<Utc>) -> String {
    let stats = snapshot.statistics();
    let mut out = format!(
        "{} logs for {}\n",
        config.application_name,
        config.format_timestamp(at)
    );

    out.push_str(&format!("--- ✨ Total Logs: {} ---\n", stats.total));
    for level in LogLevel::ALL {
        out.push_str(&format!(
            "--- {} Total {} Logs: {} ---\n",
            level.glyph(),
            stats_label(level),
            stats.count(level)
        ));
    }

    let percentages: Vec<String> = LogLevel::ALL
        .iter()
        .map(|level| format!("{} % {:.2}", level.as_str(), stats.percent(*level)))
        .collect();
    out.push_str(&format!("--- {} ---\n", percentages.join(" - ")));

    out.push_str("=== START LOGS ===\n");
    let rendered: Vec<String> = snapshot
        .records
        .iter()
        .map(|r| r.complex_description())
        .collect();
    out.push_str(&rendered.join("\n"));
    out.push_str("\n=== END LOGS ===");

    out.push_str("\n=== RAW CONSOLE ===\n");
    out.push_str(&snapshot.console_output);
    out.push_str("\n=== END RAW CONSOLE ===");

    out
}

/// Directory dumps go to by default: `<tmp>/logs`
pub fn default_dump_dir() -> PathBuf {
    std::env::temp_dir().join("logs")
}

/// File name for a dump taken at `at`
pub fn dump_file_name(config: &LoggerConfig, at: DateTime<Utc>) -> String {
    let stamp: String = config
        .format_timestamp(at)
        .chars()
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect();
    format!("log[{}].log", stamp)
}

/// Write `contents` to `dir/file_name` atomically
///
/// The text goes to a temporary file in the same directory first and is then
/// renamed over the destination, so a failed write never leaves a partial dump.
pub fn write_dump(dir: &Path, file_name: &str, contents: &str) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(file_name);
    let write_err = |source| ExportError::Write {
        path: path.clone(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(contents.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;

    tmp.persist(&path).map_err(|e| ExportError::Persist {
        path: path.clone(),
        source: e.error,
    })?;

    Ok(path)
}
