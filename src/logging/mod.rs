//! Log data model and system log plumbing
//!
//! Provides the record types, the bounded history structures the logger keeps
//! in memory, and the tracing-based system log with file retention.

mod file_writer;
mod list;
mod record;
mod retention;
mod ring;
pub(crate) mod system;
mod text;

pub use file_writer::{create_log_file_path, init_system_log, LogFileInfo, SystemLogGuard};
pub use list::{Iter, LogList};
pub use record::{
    function_path, LogComplexity, LogLevel, LogRecord, SourceLocation, SystemSeverity,
};
pub use retention::{cleanup_old_logs, cleanup_old_logs_with_retention, DEFAULT_RETENTION_DAYS};
pub use ring::RingLog;
pub use text::TextBuffer;
