//! System log file retention
//!
//! Handles cleanup of old system log files based on age.

use std::ffi::OsStr;
use std::fs::{self, DirEntry};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Result;

use super::file_writer::LOG_FILE_PREFIX;

/// Default retention period in days
pub const DEFAULT_RETENTION_DAYS: u64 = 7;

/// Clean up system log files older than the retention period
///
/// Returns the number of files deleted.
pub fn cleanup_old_logs(logs_dir: &Path) -> Result<usize> {
    cleanup_old_logs_with_retention(logs_dir, DEFAULT_RETENTION_DAYS)
}

/// Clean up system log files older than the specified number of days
///
/// Only `logmirror-*.log` files are candidates; dumps sharing the directory
/// are left alone. Returns the number of files deleted.
pub fn cleanup_old_logs_with_retention(logs_dir: &Path, retention_days: u64) -> Result<usize> {
    if !logs_dir.is_dir() {
        return Ok(0);
    }

    let max_age = Duration::from_secs(retention_days * SECS_PER_DAY);
    let now = SystemTime::now();

    let expired: Vec<PathBuf> = fs::read_dir(logs_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| is_system_log(&entry.file_name()))
        .filter(|entry| older_than(entry, now, max_age))
        .map(|entry| entry.path())
        .collect();

    let mut removed = 0;
    for path in expired {
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "Could not remove old system log"),
        }
    }
    Ok(removed)
}

const SECS_PER_DAY: u64 = 24 * 60 * 60;

fn is_system_log(name: &OsStr) -> bool {
    name.to_str()
        .map_or(false, |name| name.starts_with(LOG_FILE_PREFIX) && name.ends_with(".log"))
}

/// Unreadable timestamps count as fresh
fn older_than(entry: &DirEntry, now: SystemTime, max_age: Duration) -> bool {
    entry
        .metadata()
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| now.duration_since(modified).ok())
        .map_or(false, |age| age > max_age)
}
