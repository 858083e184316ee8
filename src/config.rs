//! Logger configuration

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::logging::{LogComplexity, LogLevel};

/// Timestamp pattern used when `date_format` is missing or invalid
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// Logger configuration
///
/// Immutable once handed to a logger; replace it wholesale with
/// [`Logger::set_config`](crate::Logger::set_config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Name shown in the dump header
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Level used when a call site does not pick one
    #[serde(default = "default_level")]
    pub default_level: LogLevel,

    /// Rendering used when a call site does not pick one
    #[serde(default = "default_complexity")]
    pub default_complexity: LogComplexity,

    /// Marker prepended to every rendered record
    #[serde(default = "default_leading_marker")]
    pub leading_marker: String,

    /// Locale identifier recorded with the config (e.g. "en_US")
    ///
    /// Timestamps are formatted with chrono's locale-independent formatter.
    #[serde(default = "default_locale")]
    pub locale: String,

    /// "utc", "local", or a fixed offset such as "+02:00"
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// strftime-style pattern for dump timestamps
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Maximum number of records kept in history
    #[serde(default = "default_history_length")]
    pub history_length: usize,

    /// Maximum number of characters kept in each raw console buffer
    #[serde(default = "default_console_buffer_chars")]
    pub console_buffer_chars: usize,

    /// Also print rendered records to the real stdout of the host process
    ///
    /// Records always land in the raw console and stdout buffers.
    #[serde(default = "default_forward_to_host_console")]
    pub forward_to_host_console: bool,
}

fn default_application_name() -> String {
    "Logmirror".to_string()
}

fn default_level() -> LogLevel {
    LogLevel::Info
}

fn default_complexity() -> LogComplexity {
    LogComplexity::Simple
}

fn default_leading_marker() -> String {
    "⚫️".to_string()
}

fn default_locale() -> String {
    "en_US".to_string()
}

fn default_timezone() -> String {
    "local".to_string()
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

fn default_history_length() -> usize {
    100_000
}

fn default_console_buffer_chars() -> usize {
    100_000
}

fn default_forward_to_host_console() -> bool {
    true
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            application_name: default_application_name(),
            default_level: default_level(),
            default_complexity: default_complexity(),
            leading_marker: default_leading_marker(),
            locale: default_locale(),
            timezone: default_timezone(),
            date_format: default_date_format(),
            history_length: default_history_length(),
            console_buffer_chars: default_console_buffer_chars(),
            forward_to_host_console: default_forward_to_host_console(),
        }
    }
}

/// Parsed form of [`LoggerConfig::timezone`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeZoneSpec {
    Utc,
    Local,
    Fixed(FixedOffset),
}

impl TimeZoneSpec {
    /// Parse a timezone option; unknown values fall back to local time
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case("utc") || value.eq_ignore_ascii_case("z") {
            return TimeZoneSpec::Utc;
        }
        parse_fixed_offset(value)
            .map(TimeZoneSpec::Fixed)
            .unwrap_or(TimeZoneSpec::Local)
    }
}

/// Parse "+HH:MM", "-HH:MM", "+HHMM" or "+HH"
fn parse_fixed_offset(value: &str) -> Option<FixedOffset> {
    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (
            digits[..2].parse::<i32>().ok()?,
            digits[2..].parse::<i32>().ok()?,
        ),
        _ => return None,
    };
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

impl LoggerConfig {
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file, or return the default if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Save configuration to a TOML file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn timezone_spec(&self) -> TimeZoneSpec {
        TimeZoneSpec::parse(&self.timezone)
    }

    /// The configured date format, or the default if it contains invalid specifiers
    pub fn effective_date_format(&self) -> &str {
        let invalid = StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error));
        if invalid {
            DEFAULT_DATE_FORMAT
        } else {
            &self.date_format
        }
    }

    /// Format a timestamp in the configured timezone and pattern
    pub fn format_timestamp(&self, at: DateTime<Utc>) -> String {
        let format = self.effective_date_format();
        match self.timezone_spec() {
            TimeZoneSpec::Utc => at.format(format).to_string(),
            TimeZoneSpec::Local => at.with_timezone(&Local).format(format).to_string(),
            TimeZoneSpec::Fixed(offset) => at.with_timezone(&offset).format(format).to_string(),
        }
    }
}

/// Get the base configuration directory (~/.logmirror)
/// Falls back to ./.logmirror if home directory cannot be determined
pub fn config_dir() -> PathBuf {
    try_config_dir().unwrap_or_else(|| {
        tracing::warn!("Could not determine home directory, using current directory for config");
        PathBuf::from(".logmirror")
    })
}

/// Try to get the base configuration directory, returning None if home dir is unavailable
pub fn try_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".logmirror"))
}

/// Get the path to the config file
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the path to the system log directory
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Ensure all required directories exist
pub fn ensure_directories() -> Result<()> {
    std::fs::create_dir_all(config_dir()).context("Failed to create config directory")?;
    std::fs::create_dir_all(logs_dir()).context("Failed to create logs directory")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = LoggerConfig::default();
        assert_eq!(config.application_name, "Logmirror");
        assert_eq!(config.default_level, LogLevel::Info);
        assert_eq!(config.default_complexity, LogComplexity::Simple);
        assert_eq!(config.history_length, 100_000);
        assert!(config.forward_to_host_console);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = LoggerConfig::new("Demo");
        config.default_level = LogLevel::Working;
        config.history_length = 50;

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: LoggerConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: LoggerConfig = toml::from_str(
            r#"
            application_name = "Partial"
            default_complexity = "complex"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.application_name, "Partial");
        assert_eq!(parsed.default_complexity, LogComplexity::Complex);
        assert_eq!(parsed.console_buffer_chars, 100_000);
    }

    #[test]
    fn test_load_and_save_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        assert_eq!(
            LoggerConfig::load_from(&path).unwrap(),
            LoggerConfig::default()
        );

        let config = LoggerConfig::new("Saved");
        config.save_to(&path).unwrap();
        assert_eq!(LoggerConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "history_length = \"lots\"").unwrap();
        assert!(LoggerConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_timezone_parsing() {
        assert_eq!(TimeZoneSpec::parse("UTC"), TimeZoneSpec::Utc);
        assert_eq!(TimeZoneSpec::parse("local"), TimeZoneSpec::Local);
        assert_eq!(
            TimeZoneSpec::parse("+02:00"),
            TimeZoneSpec::Fixed(FixedOffset::east_opt(7200).unwrap())
        );
        assert_eq!(
            TimeZoneSpec::parse("-0530"),
            TimeZoneSpec::Fixed(FixedOffset::east_opt(-(5 * 3600 + 30 * 60)).unwrap())
        );
        assert_eq!(TimeZoneSpec::parse("en_US"), TimeZoneSpec::Local);
        assert_eq!(TimeZoneSpec::parse("+99:99"), TimeZoneSpec::Local);
    }

    #[test]
    fn test_format_timestamp() {
        let mut config = LoggerConfig::default();
        config.timezone = "+01:00".to_string();
        config.date_format = "%Y-%m-%d %H:%M".to_string();

        let at = Utc.with_ymd_and_hms(2026, 1, 21, 14, 30, 45).unwrap();
        assert_eq!(config.format_timestamp(at), "2026-01-21 15:30");
    }

    #[test]
    fn test_invalid_date_format_falls_back() {
        let mut config = LoggerConfig::default();
        config.timezone = "utc".to_string();
        config.date_format = "%Q nonsense".to_string();

        assert_eq!(config.effective_date_format(), DEFAULT_DATE_FORMAT);
        let at = Utc.with_ymd_and_hms(2026, 1, 21, 14, 30, 45).unwrap();
        assert_eq!(config.format_timestamp(at), "2026-01-21T14:30:45.000+00:00");
    }

    #[test]
    fn test_config_dir_does_not_panic() {
        let dir = config_dir();
        assert!(dir.ends_with(".logmirror"));
    }
}
