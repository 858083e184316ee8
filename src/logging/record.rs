//! Log records and their rendering
//!
//! A [`LogRecord`] is created at the call site and never changes afterwards.
//! Its description is derived from its own fields only, so rendering the same
//! record twice always yields the same text.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a log record
///
/// Variants are only ordered by declaration; no ranking is implied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Fatal,
    Error,
    Warn,
    Info,
    Success,
    Working,
    Debug,
}

impl LogLevel {
    /// All levels in declaration order
    pub const ALL: [LogLevel; 7] = [
        LogLevel::Fatal,
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Success,
        LogLevel::Working,
        LogLevel::Debug,
    ];

    /// Glyph shown in front of every rendered record
    pub fn glyph(&self) -> &'static str {
        match self {
            LogLevel::Fatal => "🛑",
            LogLevel::Error => "🥲",
            LogLevel::Warn => "⚠️",
            LogLevel::Info => "🤖",
            LogLevel::Success => "✅",
            LogLevel::Working => "⚙️",
            LogLevel::Debug => "🔵",
        }
    }

    /// Get the display name for this level
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Fatal => "Fatal",
            LogLevel::Error => "Error",
            LogLevel::Warn => "Warn",
            LogLevel::Info => "Info",
            LogLevel::Success => "Success",
            LogLevel::Working => "Working",
            LogLevel::Debug => "Debug",
        }
    }

    /// Severity used when the record is emitted to the system log
    pub fn system_severity(&self) -> SystemSeverity {
        match self {
            LogLevel::Fatal => SystemSeverity::Fault,
            LogLevel::Error => SystemSeverity::Error,
            LogLevel::Warn | LogLevel::Working | LogLevel::Success => SystemSeverity::Notice,
            LogLevel::Info => SystemSeverity::Info,
            LogLevel::Debug => SystemSeverity::Debug,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// System log severities a record can be emitted at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemSeverity {
    Fault,
    Error,
    Notice,
    Info,
    Debug,
}

/// How much detail a record renders with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogComplexity {
    /// Message only
    Simple,
    /// Message followed by the source location
    Complex,
}

/// Where a record was created
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub function: String,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
        }
    }
}

/// Strip the helper item appended by [`source_location!`](crate::source_location)
/// from a type name, leaving the path of the enclosing function.
#[doc(hidden)]
pub fn function_path(type_name: &'static str) -> &'static str {
    let mut name = type_name.strip_suffix("::__here").unwrap_or(type_name);
    while let Some(outer) = name.strip_suffix("::{{closure}}") {
        name = outer;
    }
    name
}

/// Capture the current file, line and enclosing function
#[macro_export]
macro_rules! source_location {
    () => {{
        fn __here() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::SourceLocation::new(
            file!(),
            line!(),
            $crate::logging::function_path(__type_name_of(__here)),
        )
    }};
}

/// A single log event
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Unique id, stable for the lifetime of the record
    pub id: Uuid,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// Values already rendered through `Display` at the call site
    pub values: Vec<String>,
    pub separator: String,
    /// Appended after the values in simple rendering only
    pub terminator: String,
    pub level: LogLevel,
    pub complexity: LogComplexity,
    pub location: SourceLocation,
    /// Leading marker captured from the config when the record was created
    pub leader: String,
}

impl LogRecord {
    /// Create a record with a single-space separator, no terminator and no leader
    pub fn new(
        values: Vec<String>,
        level: LogLevel,
        complexity: LogComplexity,
        location: SourceLocation,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            values,
            separator: " ".to_string(),
            terminator: String::new(),
            level,
            complexity,
            location,
            leader: String::new(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.terminator = terminator.into();
        self
    }

    pub fn with_leader(mut self, leader: impl Into<String>) -> Self {
        self.leader = leader.into();
        self
    }

    /// Render according to the record's own complexity
    pub fn description(&self) -> String {
        match self.complexity {
            LogComplexity::Simple => self.simple_description(),
            LogComplexity::Complex => self.complex_description(),
        }
    }

    /// `"<leader> <glyph> <values><terminator>"`
    pub fn simple_description(&self) -> String {
        let mut out = self.prefix();
        out.push_str(&self.values.join(&self.separator));
        out.push_str(&self.terminator);
        out
    }

    /// Values followed by the source location; the terminator is not used.
    ///
    /// Release builds leave the file path out of the output.
    pub fn complex_description(&self) -> String {
        let mut out = self.prefix();
        out.push_str(&self.values.join(&self.separator));
        if cfg!(debug_assertions) {
            out.push_str(&format!(
                " - {} @ line {}, in function {}",
                self.location.file, self.location.line, self.location.function
            ));
        } else {
            out.push_str(&format!(
                " - @ line {}, in function {}",
                self.location.line, self.location.function
            ));
        }
        out
    }

    fn prefix(&self) -> String {
        format!("{} {} ", self.leader, self.level.glyph())
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}
