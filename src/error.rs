//! Error types for logger setup and export

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure while installing stream mirroring
///
/// There is no degraded mode: a redirection that half succeeded is reported
/// and the logger is not built.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to duplicate descriptor {fd}: {source}")]
    Duplicate { fd: i32, source: io::Error },

    #[error("failed to create capture pipe: {0}")]
    Pipe(io::Error),

    #[error("failed to redirect descriptor {fd} into capture pipe: {source}")]
    Redirect { fd: i32, source: io::Error },

    #[error("failed to spawn {name} thread: {source}")]
    Spawn { name: &'static str, source: io::Error },

    #[error("standard streams are already mirrored in this process")]
    AlreadyInstalled,

    #[error("stream mirroring is not supported on this platform")]
    Unsupported,
}

/// Failure while writing a dump to disk
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to create dump directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to write dump {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to move dump into place at {}: {source}", path.display())]
    Persist { path: PathBuf, source: io::Error },
}

impl ExportError {
    pub fn io_error(&self) -> &io::Error {
        match self {
            ExportError::CreateDir { source, .. }
            | ExportError::Write { source, .. }
            | ExportError::Persist { source, .. } => source,
        }
    }

    /// Short message suitable for a UI toast
    pub fn user_message(&self) -> String {
        let context = match self {
            ExportError::CreateDir { .. } => "Could not create dump directory",
            ExportError::Write { .. } | ExportError::Persist { .. } => "Could not save log dump",
        };
        friendly_io_error_message(self.io_error(), context)
    }
}

/// Categories of disk errors for user-friendly messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskErrorKind {
    /// Disk is full or quota exceeded
    DiskFull,
    /// Permission denied (read or write)
    PermissionDenied,
    /// File or directory not found
    NotFound,
    /// Other IO error
    Other,
}

impl DiskErrorKind {
    /// Get a user-friendly message for this error kind
    pub fn user_message(&self) -> &'static str {
        match self {
            DiskErrorKind::DiskFull => "Disk full - free space needed to save",
            DiskErrorKind::PermissionDenied => "Permission denied",
            DiskErrorKind::NotFound => "File or directory not found",
            DiskErrorKind::Other => "Failed to save data",
        }
    }
}

/// Categorize an IO error into a user-friendly category
pub fn categorize_io_error(e: &io::Error) -> DiskErrorKind {
    use std::io::ErrorKind;

    match e.kind() {
        ErrorKind::WriteZero => DiskErrorKind::DiskFull,
        ErrorKind::PermissionDenied => DiskErrorKind::PermissionDenied,
        ErrorKind::NotFound => DiskErrorKind::NotFound,
        _ => {
            #[cfg(unix)]
            {
                if let Some(os_error) = e.raw_os_error() {
                    if os_error == libc::ENOSPC || os_error == libc::EDQUOT {
                        return DiskErrorKind::DiskFull;
                    }
                    if os_error == libc::EACCES {
                        return DiskErrorKind::PermissionDenied;
                    }
                }
            }
            DiskErrorKind::Other
        }
    }
}

/// Create a user-friendly error message from an IO error
pub fn friendly_io_error_message(e: &io::Error, context: &str) -> String {
    match categorize_io_error(e) {
        DiskErrorKind::Other => format!("{}: {}", context, e),
        kind => format!("{}: {}", context, kind.user_message()),
    }
}
