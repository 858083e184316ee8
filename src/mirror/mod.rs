//! Standard stream mirroring
//!
//! Redirects a process descriptor (normally stdout and stderr) into an
//! internal pipe. A single background thread drains every pipe, forwards the
//! raw bytes to the descriptor's original destination and hands the decoded
//! text to a sink. Writers never wait on the sink, only on the pipe.
//!
//! Redirection is one-way: descriptors are never restored once mirroring is
//! running.

mod decode;
#[cfg(unix)]
mod unix;

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crate::error::SetupError;

pub use decode::Utf8Decoder;

/// Name of the drain thread
pub const DRAIN_THREAD_NAME: &str = "logmirror-drain";

/// Size of a single read from a capture pipe
pub(crate) const READ_CHUNK: usize = 16 * 1024;

static STANDARD_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Which stream a captured chunk came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// Text drained from a capture pipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedChunk {
    pub stream: StreamKind,
    pub text: String,
}

/// A descriptor to mirror and the stream it stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorTarget {
    pub stream: StreamKind,
    pub fd: i32,
}

impl MirrorTarget {
    pub fn new(stream: StreamKind, fd: i32) -> Self {
        Self { stream, fd }
    }

    /// The process standard output (descriptor 1)
    pub fn stdout() -> Self {
        Self::new(StreamKind::Stdout, 1)
    }

    /// The process standard error (descriptor 2)
    pub fn stderr() -> Self {
        Self::new(StreamKind::Stderr, 2)
    }
}

/// Handle to installed mirroring
///
/// Dropping the handle does not stop the drain thread or restore the
/// descriptors.
pub struct StreamMirror {
    targets: Vec<MirrorTarget>,
    /// Saved destinations of the redirected descriptors
    originals: Vec<(StreamKind, File)>,
    _drain: JoinHandle<()>,
}

impl StreamMirror {
    /// Mirror the process stdout and stderr
    ///
    /// Allowed once per process; later calls fail with
    /// [`SetupError::AlreadyInstalled`].
    pub fn install_standard<F>(sink: F) -> Result<Self, SetupError>
    where
        F: FnMut(CapturedChunk) + Send + 'static,
    {
        // Anything still sitting in std's buffers belongs to the old destination
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();

        install_once(
            &STANDARD_INSTALLED,
            vec![MirrorTarget::stdout(), MirrorTarget::stderr()],
            sink,
        )
    }

    /// Mirror arbitrary descriptors with one shared drain thread
    ///
    /// If any target fails, the targets already redirected are put back before
    /// the error is returned.
    #[cfg(unix)]
    pub fn install<F>(targets: Vec<MirrorTarget>, sink: F) -> Result<Self, SetupError>
    where
        F: FnMut(CapturedChunk) + Send + 'static,
    {
        let (drain, originals) = unix::install(&targets, sink)?;
        tracing::debug!(targets = ?targets, "Stream mirroring installed");
        Ok(Self {
            targets,
            originals,
            _drain: drain,
        })
    }

    #[cfg(not(unix))]
    pub fn install<F>(_targets: Vec<MirrorTarget>, _sink: F) -> Result<Self, SetupError>
    where
        F: FnMut(CapturedChunk) + Send + 'static,
    {
        Err(SetupError::Unsupported)
    }

    pub fn targets(&self) -> &[MirrorTarget] {
        &self.targets
    }

    /// Writer for the original destination of `stream`, bypassing the capture
    ///
    /// `None` if the stream is not mirrored or the descriptor cannot be
    /// duplicated.
    pub fn original_writer(&self, stream: StreamKind) -> Option<File> {
        let (_, file) = self.originals.iter().find(|(kind, _)| *kind == stream)?;
        match file.try_clone() {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::warn!(%stream, error = %e, "Failed to duplicate original descriptor");
                None
            }
        }
    }
}

/// Install unless `guard` says an installation already happened
///
/// A failed installation clears the guard again.
fn install_once<F>(
    guard: &AtomicBool,
    targets: Vec<MirrorTarget>,
    sink: F,
) -> Result<StreamMirror, SetupError>
where
    F: FnMut(CapturedChunk) + Send + 'static,
{
    if guard
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(SetupError::AlreadyInstalled);
    }

    let result = StreamMirror::install(targets, sink);
    if result.is_err() {
        guard.store(false, Ordering::SeqCst);
    }
    result
}

/// Destination for records forwarded to the host console
///
/// Writes go around any capture pipe, so forwarded records are not captured a
/// second time.
#[derive(Debug)]
pub enum HostConsole {
    /// The process stdout, when it is not mirrored
    Stdout,
    /// Saved original of a mirrored stdout
    Original(File),
}

impl HostConsole {
    /// Pick the host console for an optional mirror
    pub fn for_mirror(mirror: Option<&StreamMirror>) -> Self {
        mirror
            .and_then(|m| m.original_writer(StreamKind::Stdout))
            .map_or(HostConsole::Stdout, HostConsole::Original)
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        match self {
            HostConsole::Stdout => {
                let mut out = io::stdout().lock();
                writeln!(out, "{}", line)?;
                out.flush()
            }
            HostConsole::Original(file) => writeln!(file, "{}", line),
        }
    }
}

impl fmt::Debug for StreamMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamMirror")
            .field("targets", &self.targets)
            .finish_non_exhaustive()
    }
}
