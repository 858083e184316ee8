//! The logger core
//!
//! A [`Logger`] is an explicitly built, cheaply cloneable handle. Call sites
//! hand it records; a single state-owner thread applies them to the bounded
//! history and console buffers, and observers read consistent
//! [`LogSnapshot`]s. Optionally the process stdout/stderr are mirrored into the
//! same buffers.

mod export;
mod state;

pub use export::{
    default_dump_dir, dump_file_name, render_dump, write_dump, LogStatistics,
};
pub use state::{LogSnapshot, STATE_THREAD_NAME};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::LoggerConfig;
use crate::error::{ExportError, SetupError};
use crate::inspect::Debuggable;
use crate::logging::{system, LogComplexity, LogLevel, LogRecord, SourceLocation};
use crate::mirror::{HostConsole, MirrorTarget, StreamMirror};

use state::{Command, CommandSender};

/// Called after a fatal record has been applied and emitted
pub type FatalHandler = Arc<dyn Fn(&LogRecord) + Send + Sync>;

/// Per-call overrides; anything left unset comes from the current config
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    pub separator: Option<String>,
    pub terminator: Option<String>,
    pub level: Option<LogLevel>,
    pub complexity: Option<LogComplexity>,
}

impl LogOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    pub fn terminator(mut self, terminator: impl Into<String>) -> Self {
        self.terminator = Some(terminator.into());
        self
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn complexity(mut self, complexity: LogComplexity) -> Self {
        self.complexity = Some(complexity);
        self
    }
}

impl From<LogLevel> for LogOptions {
    fn from(level: LogLevel) -> Self {
        Self::new().level(level)
    }
}

/// Which descriptors a logger mirrors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MirrorMode {
    #[default]
    Disabled,
    /// The process stdout and stderr
    Standard,
    Targets(Vec<MirrorTarget>),
}

/// Builder for [`Logger`]
pub struct LoggerBuilder {
    config: LoggerConfig,
    mirror: MirrorMode,
    on_fatal: Option<FatalHandler>,
}

impl LoggerBuilder {
    pub fn new(config: LoggerConfig) -> Self {
        Self {
            config,
            mirror: MirrorMode::Disabled,
            on_fatal: None,
        }
    }

    /// Mirror the process stdout and stderr (once per process)
    pub fn mirror_standard_streams(mut self) -> Self {
        self.mirror = MirrorMode::Standard;
        self
    }

    /// Mirror the given descriptors instead of the standard streams
    pub fn mirror_targets(mut self, targets: Vec<MirrorTarget>) -> Self {
        self.mirror = MirrorMode::Targets(targets);
        self
    }

    /// Replace the default fatal behaviour, which aborts the process
    pub fn on_fatal<F>(mut self, handler: F) -> Self
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
    {
        self.on_fatal = Some(Arc::new(handler));
        self
    }

    /// Start the state owner and install mirroring
    ///
    /// Mirroring failures abort the build; nothing is left half-redirected.
    pub fn build(self) -> Result<Logger, SetupError> {
        let config = Arc::new(self.config);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(LogSnapshot::default()));
        let (config_tx, _) = watch::channel(Arc::clone(&config));

        state::spawn_owner(Arc::clone(&config), command_rx, snapshot_tx)?;

        let mirror = match self.mirror {
            MirrorMode::Disabled => None,
            MirrorMode::Standard => Some(StreamMirror::install_standard(capture_sink(&command_tx))?),
            MirrorMode::Targets(targets) => {
                Some(StreamMirror::install(targets, capture_sink(&command_tx))?)
            }
        };

        if let Some(mirror) = &mirror {
            tracing::info!(targets = ?mirror.targets(), "Console mirroring active");
        }
        // Forwarded records must skip the capture pipe
        let _ = command_tx.send(Command::AttachHost(HostConsole::for_mirror(mirror.as_ref())));

        Ok(Logger {
            inner: Arc::new(Inner {
                commands: command_tx,
                config: config_tx,
                snapshots: snapshot_rx,
                on_fatal: self
                    .on_fatal
                    .unwrap_or_else(|| Arc::new(abort_on_fatal) as FatalHandler),
                mirror,
            }),
        })
    }
}

fn capture_sink(commands: &CommandSender) -> impl FnMut(crate::mirror::CapturedChunk) + Send + 'static {
    let commands = commands.clone();
    move |chunk| {
        // The owner only goes away with the last logger handle
        let _ = commands.send(Command::Captured(chunk));
    }
}

fn abort_on_fatal(_record: &LogRecord) {
    std::process::abort();
}

struct Inner {
    commands: CommandSender,
    config: watch::Sender<Arc<LoggerConfig>>,
    snapshots: watch::Receiver<Arc<LogSnapshot>>,
    on_fatal: FatalHandler,
    mirror: Option<StreamMirror>,
}

/// Handle to a logging service
///
/// Clones share the same history, buffers and configuration.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

impl Logger {
    pub fn builder(config: LoggerConfig) -> LoggerBuilder {
        LoggerBuilder::new(config)
    }

    /// Logger without stream mirroring
    pub fn new(config: LoggerConfig) -> Result<Self, SetupError> {
        LoggerBuilder::new(config).build()
    }

    /// Accept a fully built record
    ///
    /// Returns as soon as the record is queued. Fatal records are an exception:
    /// the call waits until the record is applied, emits it, then runs the
    /// fatal handler (by default the process aborts).
    pub fn log(&self, record: LogRecord) {
        if record.level == LogLevel::Debug && !cfg!(debug_assertions) {
            return;
        }

        let fatal = record.level == LogLevel::Fatal;
        let description = if fatal {
            record.complex_description()
        } else {
            record.description()
        };
        let record = Arc::new(record);

        self.send(Command::Append {
            record: Arc::clone(&record),
            description: description.clone(),
        });

        if fatal {
            self.flush();
            system::emit(&record, &description);
            (self.inner.on_fatal)(&record);
        } else {
            system::emit(&record, &description);
        }
    }

    /// Build a record from rendered values and the current config, then log it
    pub fn log_values(&self, values: Vec<String>, options: LogOptions, location: SourceLocation) {
        let config = self.config();
        let record = LogRecord::new(
            values,
            options.level.unwrap_or(config.default_level),
            options.complexity.unwrap_or(config.default_complexity),
            location,
        )
        .with_separator(options.separator.unwrap_or_else(|| " ".to_string()))
        .with_terminator(options.terminator.unwrap_or_default())
        .with_leader(config.leading_marker.clone());
        self.log(record);
    }

    /// Log a debug record describing `value`
    pub fn inspect(&self, name: &str, value: &dyn Debuggable, location: SourceLocation) {
        self.log_values(
            vec![format!("{}:", name), value.long_description()],
            LogOptions::new().level(LogLevel::Debug),
            location,
        );
    }

    /// The configuration in effect for new calls
    pub fn config(&self) -> Arc<LoggerConfig> {
        self.inner.config.borrow().clone()
    }

    /// Replace the configuration wholesale
    ///
    /// Call-site defaults change immediately; history and buffer bounds change
    /// in order with the records already queued.
    pub fn set_config(&self, config: LoggerConfig) {
        let config = Arc::new(config);
        self.inner.config.send_replace(Arc::clone(&config));
        self.send(Command::Reconfigure(config));
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<LogSnapshot> {
        self.inner.snapshots.borrow().clone()
    }

    /// Receiver notified on every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<LogSnapshot>> {
        self.inner.snapshots.clone()
    }

    /// Block until everything queued so far is applied and published
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.inner.commands.send(Command::Flush(ack_tx)).is_ok() {
            wait_for_ack(ack_rx);
        }
    }

    /// Render the dump report for the current state
    pub fn dump_to_text(&self) -> String {
        self.flush();
        render_dump(&self.config(), &self.snapshot(), Utc::now())
    }

    /// Write the dump report to the default dump directory
    pub fn dump_to_file(&self) -> Result<PathBuf, ExportError> {
        self.dump_to_file_in(&default_dump_dir())
    }

    /// Write the dump report into `dir`, creating it if needed
    pub fn dump_to_file_in(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let now = Utc::now();
        self.flush();
        let config = self.config();
        let text = render_dump(&config, &self.snapshot(), now);
        let path = write_dump(dir, &dump_file_name(&config, now), &text)?;
        tracing::info!(path = %path.display(), "Wrote log dump");
        Ok(path)
    }

    pub fn mirror(&self) -> Option<&StreamMirror> {
        self.inner.mirror.as_ref()
    }

    fn send(&self, command: Command) {
        if self.inner.commands.send(command).is_err() {
            tracing::warn!("Log state owner is gone, dropping command");
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("config", &self.config())
            .field("mirror", &self.inner.mirror)
            .finish_non_exhaustive()
    }
}

/// Block on a flush acknowledgement from any thread
///
/// `blocking_recv` panics on a runtime worker, so async callers wait on a
/// short-lived helper thread instead.
fn wait_for_ack(ack: oneshot::Receiver<()>) {
    if tokio::runtime::Handle::try_current().is_err() {
        let _ = ack.blocking_recv();
        return;
    }

    std::thread::scope(|scope| {
        let waiter = std::thread::Builder::new()
            .name("logmirror-flush".to_string())
            .spawn_scoped(scope, move || {
                let _ = ack.blocking_recv();
            });
        match waiter {
            Ok(handle) => {
                let _ = handle.join();
            }
            Err(e) => tracing::warn!(error = %e, "Could not wait for flush"),
        }
    });
}

static GLOBAL: OnceLock<Logger> = OnceLock::new();

/// Make `logger` the process-wide default handle
///
/// Meant to be called once during startup, after the logger is built. Returns
/// false if a default was already installed.
pub fn install_global(logger: Logger) -> bool {
    GLOBAL.set(logger).is_ok()
}

/// The process-wide default handle, if one was installed
pub fn global() -> Option<&'static Logger> {
    GLOBAL.get()
}

/// Log values through a [`Logger`], capturing the call site
///
/// ```ignore
/// emit!(logger, "cache warmed in", ms, "ms");
/// emit!(logger, level = LogLevel::Error; "request failed:", err);
/// emit!(logger, opts = LogOptions::new().separator(", "); a, b, c);
/// ```
#[macro_export]
macro_rules! emit {
    ($logger:expr, level = $level:expr; $($value:expr),+ $(,)?) => {
        $crate::emit!($logger, opts = $crate::LogOptions::new().level($level); $($value),+)
    };
    ($logger:expr, opts = $opts:expr; $($value:expr),+ $(,)?) => {
        $logger.log_values(
            ::std::vec![$(::std::string::ToString::to_string(&$value)),+],
            $opts,
            $crate::source_location!(),
        )
    };
    ($logger:expr, $($value:expr),+ $(,)?) => {
        $crate::emit!($logger, opts = $crate::LogOptions::new(); $($value),+)
    };
}

/// Log a debug description of a [`Debuggable`] value, capturing the call site
#[macro_export]
macro_rules! inspect {
    ($logger:expr, $name:expr, $value:expr) => {
        $logger.inspect($name, &$value, $crate::source_location!())
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_config(history_length: usize) -> LoggerConfig {
        let mut config = LoggerConfig::new("Test");
        config.history_length = history_length;
        config.timezone = "utc".to_string();
        config.forward_to_host_console = false;
        config
    }

    fn values(snapshot: &LogSnapshot) -> Vec<String> {
        snapshot.records.iter().map(|r| r.values.join(" ")).collect()
    }

    #[test]
    fn test_log_and_snapshot() {
        let logger = Logger::new(test_config(100)).unwrap();
        emit!(logger, "hello", 42);
        emit!(logger, level = LogLevel::Warn; "careful");
        logger.flush();

        let snapshot = logger.snapshot();
        assert_eq!(values(&snapshot), vec!["hello 42", "careful"]);
        assert_eq!(snapshot.records[0].level, LogLevel::Info);
        assert_eq!(snapshot.records[1].level, LogLevel::Warn);
        assert_eq!(snapshot.records[0].leader, "⚫️");
        assert!(snapshot.records[0]
            .location
            .function
            .ends_with("test_log_and_snapshot"));
        assert_eq!(snapshot.console_output, "⚫️ 🤖 hello 42\n⚫️ ⚠️ careful\n");
        assert_eq!(snapshot.stdout, snapshot.console_output);
    }

    #[test]
    fn test_history_bound_keeps_last_records() {
        let logger = Logger::new(test_config(3)).unwrap();
        for i in 0..10 {
            emit!(logger, i);
        }
        logger.flush();
        assert_eq!(values(&logger.snapshot()), vec!["7", "8", "9"]);
    }

    #[test]
    fn test_options_override_defaults() {
        let logger = Logger::new(test_config(10)).unwrap();
        emit!(
            logger,
            opts = LogOptions::new().separator(", ").terminator("!").complexity(LogComplexity::Simple);
            "a",
            "b"
        );
        logger.flush();
        assert_eq!(logger.snapshot().console_output, "⚫️ 🤖 a, b!\n");
    }

    #[test]
    fn test_set_config_changes_defaults() {
        let logger = Logger::new(test_config(10)).unwrap();
        let mut config = test_config(10);
        config.default_level = LogLevel::Success;
        config.leading_marker = ">>".to_string();
        logger.set_config(config);

        emit!(logger, "after");
        logger.flush();

        let snapshot = logger.snapshot();
        assert_eq!(snapshot.records[0].level, LogLevel::Success);
        assert_eq!(snapshot.records[0].description(), ">> ✅ after");
        assert_eq!(logger.config().leading_marker, ">>");
    }

    #[test]
    fn test_calls_from_many_threads() {
        let logger = Logger::new(test_config(1_000)).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let logger = logger.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        emit!(logger, t, i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        logger.flush();

        let snapshot = logger.snapshot();
        assert_eq!(snapshot.records.len(), 200);
        assert_eq!(snapshot.console_output.lines().count(), 200);
        for t in 0..4 {
            let ours: Vec<_> = snapshot
                .records
                .iter()
                .filter(|r| r.values[0] == t.to_string())
                .map(|r| r.values[1].parse::<usize>().unwrap())
                .collect();
            assert_eq!(ours, (0..50).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_fatal_record_applied_before_handler() {
        let temp_dir = TempDir::new().unwrap();
        let dump_dir = temp_dir.path().to_path_buf();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);

        // The handler stands in for termination and persists what it sees
        let observer: Arc<OnceLock<Logger>> = Arc::new(OnceLock::new());
        let observer_in_handler = Arc::clone(&observer);
        let logger = Logger::builder(test_config(10))
            .on_fatal(move |record| {
                seen.fetch_add(1, Ordering::SeqCst);
                if let Some(logger) = observer_in_handler.get() {
                    let snapshot = logger.snapshot();
                    assert!(snapshot.records.iter().any(|r| r.id == record.id));
                    logger.dump_to_file_in(&dump_dir).unwrap();
                }
            })
            .build()
            .unwrap();
        observer.set(logger.clone()).ok().unwrap();

        emit!(logger, level = LogLevel::Fatal; "invariant broken");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let dumps: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(dumps.len(), 1);
        let text = std::fs::read_to_string(&dumps[0]).unwrap();
        assert!(text.contains("🛑 invariant broken - "));
        assert!(text.contains("--- 🛑 Total Fatal Error Logs: 1 ---"));
    }

    #[test]
    fn test_fatal_uses_complex_description() {
        let logger = Logger::builder(test_config(10))
            .on_fatal(|_| {})
            .build()
            .unwrap();
        emit!(logger, level = LogLevel::Fatal; "boom");
        let snapshot = logger.snapshot();
        assert!(snapshot.console_output.contains("boom - "));
        assert!(snapshot.console_output.contains("in function"));
    }

    #[test]
    fn test_dump_to_text_reflects_queued_records() {
        let logger = Logger::new(test_config(10)).unwrap();
        emit!(logger, level = LogLevel::Error; "oops");
        emit!(logger, level = LogLevel::Info; "fine");

        let text = logger.dump_to_text();
        assert!(text.starts_with("Test logs for "));
        assert!(text.contains("--- ✨ Total Logs: 2 ---"));
        assert!(text.contains("Error % 50.00"));
        assert!(text.contains("🥲 oops - "));
        assert!(text.contains("=== RAW CONSOLE ===\n⚫️ 🥲 oops\n⚫️ 🤖 fine\n\n=== END RAW CONSOLE ==="));
    }

    #[test]
    fn test_dump_to_file_in_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("logs");
        let logger = Logger::new(test_config(10)).unwrap();
        emit!(logger, "persisted");

        let path = logger.dump_to_file_in(&dir).unwrap();
        assert!(path.starts_with(&dir));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("log[") && name.ends_with("].log"));
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("persisted"));
    }

    #[test]
    fn test_inspect_logs_debug_description() {
        let logger = Logger::new(test_config(10)).unwrap();
        let retries: Option<u32> = Some(3);
        crate::inspect!(logger, "retries", retries);
        logger.flush();

        let snapshot = logger.snapshot();
        if cfg!(debug_assertions) {
            assert_eq!(snapshot.records.len(), 1);
            assert_eq!(snapshot.records[0].level, LogLevel::Debug);
            assert_eq!(snapshot.records[0].values, vec!["retries:", "3"]);
        } else {
            assert!(snapshot.records.is_empty());
        }
    }

    #[test]
    fn test_set_config_publishes_snapshot() {
        let logger = Logger::new(test_config(10)).unwrap();
        let mut rx = logger.subscribe();
        logger.set_config(test_config(5));
        tokio_test::block_on(rx.changed()).unwrap();
        assert_eq!(rx.borrow().revision, 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_new_snapshots() {
        let logger = Logger::new(test_config(10)).unwrap();
        let mut rx = logger.subscribe();
        let before = rx.borrow_and_update().revision;

        emit!(logger, "ping");

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        let snapshot = rx.borrow().clone();
        assert!(snapshot.revision > before);
        assert_eq!(values(&snapshot), vec!["ping"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_mirrored_descriptor_lands_in_buffers() {
        use std::io::Write;
        use std::os::fd::AsRawFd;

        let dest = tempfile::NamedTempFile::new().unwrap();
        let mut target = std::fs::OpenOptions::new()
            .append(true)
            .open(dest.path())
            .unwrap();

        let logger = Logger::builder(test_config(10))
            .mirror_targets(vec![MirrorTarget::new(
                crate::mirror::StreamKind::Stderr,
                target.as_raw_fd(),
            )])
            .build()
            .unwrap();
        assert!(logger.mirror().is_some());

        target.write_all(b"warning: ").unwrap();
        target.write_all(b"disk low\n").unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while logger.snapshot().stderr != "warning: disk low\n"
            && std::time::Instant::now() < deadline
        {
            std::thread::sleep(Duration::from_millis(10));
        }

        let snapshot = logger.snapshot();
        assert_eq!(snapshot.stderr, "warning: disk low\n");
        assert_eq!(snapshot.console_output, "warning: disk low\n");
        assert!(snapshot.stdout.is_empty());
        assert!(snapshot.records.is_empty());
        drop(target);
    }

    #[test]
    fn test_raw_console_keeps_records_without_forwarding() {
        let logger = Logger::new(test_config(10)).unwrap();
        emit!(logger, level = LogLevel::Error; "disk failed");

        let text = logger.dump_to_text();
        assert!(text.contains("=== RAW CONSOLE ===\n⚫️ 🥲 disk failed\n"));
        assert_eq!(logger.snapshot().stdout, "⚫️ 🥲 disk failed\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_forwarded_records_reach_terminal_once() {
        use std::io::Write;
        use std::os::fd::AsRawFd;

        let dest = tempfile::NamedTempFile::new().unwrap();
        let mut target = std::fs::OpenOptions::new()
            .append(true)
            .open(dest.path())
            .unwrap();

        let mut config = test_config(10);
        config.forward_to_host_console = true;
        let logger = Logger::builder(config)
            .mirror_targets(vec![MirrorTarget::new(
                crate::mirror::StreamKind::Stdout,
                target.as_raw_fd(),
            )])
            .build()
            .unwrap();

        emit!(logger, "hello");
        target.write_all(b"raw\n").unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            let terminal = std::fs::read_to_string(dest.path()).unwrap();
            let buffered = logger.snapshot().stdout.contains("raw\n");
            if (buffered && terminal.contains("⚫️ 🤖 hello\n") && terminal.contains("raw\n"))
                || std::time::Instant::now() >= deadline
            {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        let terminal = std::fs::read_to_string(dest.path()).unwrap();
        assert!(terminal.contains("⚫️ 🤖 hello\n"));
        assert!(terminal.contains("raw\n"));

        let snapshot = logger.snapshot();
        assert_eq!(snapshot.stdout.matches("⚫️ 🤖 hello").count(), 1);
        assert_eq!(snapshot.console_output.matches("⚫️ 🤖 hello").count(), 1);
        assert!(snapshot.stdout.contains("raw\n"));
        drop(target);
    }

    #[tokio::test]
    async fn test_dump_from_async_context() {
        let logger = Logger::new(test_config(10)).unwrap();
        emit!(logger, "from a task");

        let text = logger.dump_to_text();
        assert!(text.contains("--- ✨ Total Logs: 1 ---"));
        assert!(text.contains("from a task"));
    }

    #[test]
    fn test_global_handle_installs_once() {
        let first = Logger::new(test_config(10)).unwrap();
        let second = Logger::new(test_config(10)).unwrap();
        let installed_first = install_global(first);
        let installed_second = install_global(second);
        assert!(!installed_second);
        if installed_first {
            assert!(global().is_some());
        }
    }
}
