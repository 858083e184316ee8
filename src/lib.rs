//! Logmirror - in-process log history with standard stream mirroring
//!
//! Records logged through a [`Logger`] are kept in a bounded history, rendered
//! into console buffers and forwarded to the tracing-based system log. When
//! mirroring is enabled, everything the process writes to stdout and stderr is
//! captured into the same buffers while still reaching the terminal.

pub mod config;
pub mod error;
pub mod inspect;
pub mod logger;
pub mod logging;
pub mod mirror;

pub use config::LoggerConfig;
pub use error::{ExportError, SetupError};
pub use inspect::Debuggable;
pub use logger::{
    global, install_global, LogOptions, LogSnapshot, LogStatistics, Logger, LoggerBuilder,
    MirrorMode,
};
pub use logging::{LogComplexity, LogLevel, LogRecord, SourceLocation};
pub use mirror::{CapturedChunk, MirrorTarget, StreamKind, StreamMirror};
