//! State owner for the log history and console buffers
//!
//! Every mutation goes through one thread. Producers only enqueue commands;
//! the owner applies them in arrival order and publishes a complete snapshot
//! after a batch, so observers never see a half-applied update.
//!
//! Building a snapshot copies the whole history, so publishing is rate limited
//! to one snapshot per [`PUBLISH_INTERVAL`]. A flush always publishes.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::config::LoggerConfig;
use crate::error::SetupError;
use crate::logging::{LogLevel, LogRecord, RingLog, TextBuffer};
use crate::mirror::{CapturedChunk, HostConsole, StreamKind};

use super::export::LogStatistics;

/// Name of the state owner thread
pub const STATE_THREAD_NAME: &str = "logmirror-state";

/// Upper bound on commands applied before a snapshot is published
const MAX_BATCH: usize = 256;

/// Minimum time between two snapshots not forced by a flush
pub(crate) const PUBLISH_INTERVAL: Duration = Duration::from_millis(50);

pub(crate) type CommandSender = mpsc::UnboundedSender<Command>;

/// Work sent to the state owner
pub(crate) enum Command {
    Append {
        record: Arc<LogRecord>,
        description: String,
    },
    Captured(CapturedChunk),
    Reconfigure(Arc<LoggerConfig>),
    /// Where forwarded records go from now on
    AttachHost(HostConsole),
    /// Acknowledged once everything queued before it is applied and published
    Flush(oneshot::Sender<()>),
}

/// Consistent view of the logger state at one point in time
#[derive(Debug, Clone, Default)]
pub struct LogSnapshot {
    /// Increases by one for every published change
    pub revision: u64,
    /// Retained records, oldest first
    pub records: Vec<Arc<LogRecord>>,
    /// Rendered records and captured output of both streams, interleaved
    pub console_output: String,
    pub stdout: String,
    pub stderr: String,
}

impl LogSnapshot {
    pub fn statistics(&self) -> LogStatistics {
        LogStatistics::from_records(self.records.iter().map(|r| r.as_ref()))
    }

    /// Records at the given level, oldest first
    pub fn records_at(&self, level: LogLevel) -> impl Iterator<Item = &Arc<LogRecord>> + '_ {
        self.records.iter().filter(move |r| r.level == level)
    }
}

struct LogState {
    config: Arc<LoggerConfig>,
    records: RingLog<Arc<LogRecord>>,
    console_output: TextBuffer,
    stdout: TextBuffer,
    stderr: TextBuffer,
    host: HostConsole,
    revision: u64,
}

impl LogState {
    fn new(config: Arc<LoggerConfig>) -> Self {
        let chars = config.console_buffer_chars;
        Self {
            records: RingLog::new(config.history_length),
            console_output: TextBuffer::new(chars),
            stdout: TextBuffer::new(chars),
            stderr: TextBuffer::new(chars),
            host: HostConsole::Stdout,
            revision: 0,
            config,
        }
    }

    /// Apply a mutating command; returns true if observable state changed
    fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::Append {
                record,
                description,
            } => {
                self.records.push(record);
                self.console_output.push_line(&description);
                self.stdout.push_line(&description);
                if self.config.forward_to_host_console {
                    if let Err(e) = self.host.write_line(&description) {
                        tracing::warn!(error = %e, "Failed to forward record to host console");
                    }
                }
                true
            }
            Command::Captured(chunk) => {
                self.console_output.push_str(&chunk.text);
                match chunk.stream {
                    StreamKind::Stdout => self.stdout.push_str(&chunk.text),
                    StreamKind::Stderr => self.stderr.push_str(&chunk.text),
                }
                true
            }
            Command::Reconfigure(config) => {
                let evicted = self.records.set_capacity(config.history_length);
                let chars = config.console_buffer_chars;
                self.console_output.set_max_chars(chars);
                self.stdout.set_max_chars(chars);
                self.stderr.set_max_chars(chars);
                self.config = config;
                if evicted > 0 {
                    tracing::debug!(evicted, "History shrunk by new config");
                }
                true
            }
            Command::AttachHost(host) => {
                self.host = host;
                false
            }
            Command::Flush(_) => false,
        }
    }

    fn snapshot(&self) -> LogSnapshot {
        LogSnapshot {
            revision: self.revision,
            records: self.records.to_vec(),
            console_output: self.console_output.as_str().to_string(),
            stdout: self.stdout.as_str().to_string(),
            stderr: self.stderr.as_str().to_string(),
        }
    }
}

/// Start the state owner thread
///
/// The thread ends once every command sender is dropped.
pub(crate) fn spawn_owner(
    config: Arc<LoggerConfig>,
    commands: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<Arc<LogSnapshot>>,
) -> Result<JoinHandle<()>, SetupError> {
    let spawn_err = |source| SetupError::Spawn {
        name: STATE_THREAD_NAME,
        source,
    };
    // The owner only needs timers for the publish deadline
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(spawn_err)?;

    std::thread::Builder::new()
        .name(STATE_THREAD_NAME.to_string())
        .spawn(move || runtime.block_on(run_owner(LogState::new(config), commands, snapshots)))
        .map_err(spawn_err)
}

/// Tracks unpublished changes and when the last snapshot went out
struct Publisher {
    snapshots: watch::Sender<Arc<LogSnapshot>>,
    last: Option<Instant>,
    dirty: bool,
}

impl Publisher {
    fn new(snapshots: watch::Sender<Arc<LogSnapshot>>) -> Self {
        Self {
            snapshots,
            last: None,
            dirty: false,
        }
    }

    /// When pending changes must go out, if there are any
    fn deadline(&self) -> Option<Instant> {
        if !self.dirty {
            return None;
        }
        Some(self.last.map_or_else(Instant::now, |last| last + PUBLISH_INTERVAL))
    }

    fn is_due(&self) -> bool {
        self.deadline().map_or(false, |deadline| deadline <= Instant::now())
    }

    fn publish(&mut self, state: &mut LogState) {
        if !self.dirty {
            return;
        }
        state.revision += 1;
        self.snapshots.send_replace(Arc::new(state.snapshot()));
        self.last = Some(Instant::now());
        self.dirty = false;
    }
}

async fn run_owner(
    mut state: LogState,
    mut commands: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<Arc<LogSnapshot>>,
) {
    let mut publisher = Publisher::new(snapshots);

    loop {
        let received = match publisher.deadline() {
            Some(deadline) => match tokio::time::timeout_at(deadline, commands.recv()).await {
                Ok(received) => received,
                Err(_) => {
                    publisher.publish(&mut state);
                    continue;
                }
            },
            None => commands.recv().await,
        };
        let Some(first) = received else {
            break;
        };

        let mut acks = Vec::new();
        let mut applied = 0;
        let mut next = Some(first);

        while let Some(command) = next.take() {
            match command {
                Command::Flush(ack) => acks.push(ack),
                other => publisher.dirty |= state.apply(other),
            }
            applied += 1;
            if applied < MAX_BATCH {
                next = commands.try_recv().ok();
            }
        }

        if !acks.is_empty() || publisher.is_due() {
            publisher.publish(&mut state);
        }

        for ack in acks {
            let _ = ack.send(());
        }
    }

    publisher.publish(&mut state);
    tracing::debug!("All logger handles dropped, state owner exiting");
}
