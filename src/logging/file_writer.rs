//! File-based system log with tracing integration
//!
//! Records emitted to the system log are `tracing` events. This module installs
//! a subscriber that writes them to a timestamped file. Standard error is not
//! used as a sink because it may be mirrored back into the logger.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Local;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// File name prefix shared with the retention cleanup
pub(crate) const LOG_FILE_PREFIX: &str = "logmirror-";

/// Information about the current system log file
#[derive(Debug, Clone)]
pub struct LogFileInfo {
    /// Full path to the log file
    pub path: PathBuf,
}

/// Generate a timestamped log file path
pub fn create_log_file_path(logs_dir: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    logs_dir.join(format!("{}{}.log", LOG_FILE_PREFIX, timestamp))
}

/// Writer that appends each formatted event to the shared file
struct SystemLogWriter {
    file: Arc<Mutex<File>>,
}

impl std::io::Write for SystemLogWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(mut file) = self.file.lock() {
            file.write_all(buf)?;
            file.flush()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if let Ok(mut file) = self.file.lock() {
            file.flush()
        } else {
            Ok(())
        }
    }
}

/// Writer factory for tracing-subscriber
struct SystemLogWriterMaker {
    file: Arc<Mutex<File>>,
}

impl<'a> MakeWriter<'a> for SystemLogWriterMaker {
    type Writer = SystemLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SystemLogWriter {
            file: Arc::clone(&self.file),
        }
    }
}

/// Guard that keeps the system log file open
pub struct SystemLogGuard {
    _file: Arc<Mutex<File>>,
}

/// Open the system log file and install the global tracing subscriber
///
/// The filter comes from `RUST_LOG` and defaults to `logmirror=debug`.
pub fn init_system_log(logs_dir: PathBuf) -> Result<(LogFileInfo, SystemLogGuard)> {
    fs::create_dir_all(&logs_dir).context("Failed to create logs directory")?;

    let log_path = create_log_file_path(&logs_dir);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    let file = Arc::new(Mutex::new(file));

    let writer = SystemLogWriterMaker {
        file: Arc::clone(&file),
    };

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "logmirror=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    let info = LogFileInfo { path: log_path };
    let guard = SystemLogGuard { _file: file };

    Ok((info, guard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use tempfile::TempDir;

    #[test]
    fn test_create_log_file_path() {
        let logs_dir = PathBuf::from("/tmp/logmirror/logs");
        let path = create_log_file_path(&logs_dir);
        assert!(path.to_string_lossy().contains("logmirror-"));
        assert!(path.to_string_lossy().ends_with(".log"));
    }

    #[test]
    fn test_writer_appends_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("system.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap();

        let maker = SystemLogWriterMaker {
            file: Arc::new(Mutex::new(file)),
        };
        maker.make_writer().write_all(b"first\n").unwrap();
        maker.make_writer().write_all(b"second\n").unwrap();

        let mut content = String::new();
        File::open(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "first\nsecond\n");
    }
}
