//! Descriptor redirection and the drain loop on Unix

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::mpsc;
use std::thread::JoinHandle;

use super::{CapturedChunk, MirrorTarget, StreamKind, Utf8Decoder, DRAIN_THREAD_NAME, READ_CHUNK};
use crate::error::SetupError;

/// One redirected descriptor as seen by the drain thread
struct Channel {
    stream: StreamKind,
    /// Read end of the capture pipe
    reader: File,
    /// Duplicate of the descriptor taken before redirection
    original: File,
    decoder: Utf8Decoder,
    open: bool,
}

impl Channel {
    /// Read once and forward; returns false once the pipe is finished
    fn drain_once<F>(&mut self, buf: &mut [u8], sink: &mut F) -> bool
    where
        F: FnMut(CapturedChunk),
    {
        match self.reader.read(buf) {
            Ok(0) => false,
            Ok(n) => {
                let bytes = &buf[..n];
                if let Err(e) = self.original.write_all(bytes) {
                    tracing::warn!(stream = %self.stream, error = %e, "Failed to forward captured bytes");
                }
                let text = self.decoder.decode(bytes);
                if !text.is_empty() {
                    sink(CapturedChunk {
                        stream: self.stream,
                        text,
                    });
                }
                true
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) => {
                true
            }
            Err(e) => {
                tracing::error!(stream = %self.stream, error = %e, "Capture pipe read failed");
                false
            }
        }
    }
}

/// Start the drain thread and redirect every target
///
/// The thread is spawned before any descriptor is touched, so a spawn failure
/// leaves the process untouched.
/// Returns the drain thread and a second handle on every saved original, for
/// writers that must reach the real destination without being captured.
pub(super) fn install<F>(
    targets: &[MirrorTarget],
    sink: F,
) -> Result<(JoinHandle<()>, Vec<(StreamKind, File)>), SetupError>
where
    F: FnMut(CapturedChunk) + Send + 'static,
{
    let (handoff_tx, handoff_rx) = mpsc::channel::<Vec<Channel>>();

    let handle = std::thread::Builder::new()
        .name(DRAIN_THREAD_NAME.to_string())
        .spawn(move || {
            // A dropped sender means installation failed
            if let Ok(channels) = handoff_rx.recv() {
                drain_loop(channels, sink);
            }
        })
        .map_err(|source| SetupError::Spawn {
            name: DRAIN_THREAD_NAME,
            source,
        })?;

    let mut channels: Vec<Channel> = Vec::with_capacity(targets.len());
    for target in targets {
        match redirect_target(target) {
            Ok(channel) => channels.push(channel),
            Err(e) => {
                rollback(targets, &channels);
                return Err(e);
            }
        }
    }

    let mut originals = Vec::with_capacity(channels.len());
    for (target, channel) in targets.iter().zip(&channels) {
        match channel.original.try_clone() {
            Ok(file) => originals.push((channel.stream, file)),
            Err(source) => {
                rollback(targets, &channels);
                return Err(SetupError::Duplicate {
                    fd: target.fd,
                    source,
                });
            }
        }
    }

    if let Err(mpsc::SendError(channels)) = handoff_tx.send(channels) {
        rollback(targets, &channels);
        return Err(SetupError::Spawn {
            name: DRAIN_THREAD_NAME,
            source: io::Error::new(io::ErrorKind::Other, "drain thread exited early"),
        });
    }

    Ok((handle, originals))
}

fn redirect_target(target: &MirrorTarget) -> Result<Channel, SetupError> {
    let original = dup_cloexec(target.fd).map_err(|source| SetupError::Duplicate {
        fd: target.fd,
        source,
    })?;

    let (read_end, write_end) = pipe_cloexec().map_err(SetupError::Pipe)?;

    dup2(write_end.as_raw_fd(), target.fd).map_err(|source| SetupError::Redirect {
        fd: target.fd,
        source,
    })?;
    // The target descriptor now holds the write end
    drop(write_end);

    Ok(Channel {
        stream: target.stream,
        reader: File::from(read_end),
        original: File::from(original),
        decoder: Utf8Decoder::new(),
        open: true,
    })
}

/// Point already redirected targets back at their original destination
fn rollback(targets: &[MirrorTarget], channels: &[Channel]) {
    for (target, channel) in targets.iter().zip(channels) {
        if let Err(e) = dup2(channel.original.as_raw_fd(), target.fd) {
            tracing::error!(fd = target.fd, error = %e, "Failed to restore descriptor");
        }
    }
}

/// Block on every open pipe and drain whichever has data
///
/// Runs until every pipe reports end of file, which only happens when the
/// redirected descriptors themselves are closed.
fn drain_loop<F>(mut channels: Vec<Channel>, mut sink: F)
where
    F: FnMut(CapturedChunk),
{
    let mut buf = vec![0u8; READ_CHUNK];
    let mut pollfds: Vec<libc::pollfd> = channels
        .iter()
        .map(|c| libc::pollfd {
            fd: c.reader.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();

    while channels.iter().any(|c| c.open) {
        let rc = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, -1) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            tracing::error!(error = %err, "Capture poll failed, stopping drain");
            break;
        }

        for (pfd, channel) in pollfds.iter_mut().zip(channels.iter_mut()) {
            if pfd.revents == 0 || !channel.open {
                continue;
            }
            if !channel.drain_once(&mut buf, &mut sink) {
                channel.open = false;
                // Negative descriptors are ignored by poll
                pfd.fd = -1;
            }
        }
    }

    tracing::debug!("Capture pipes closed, drain thread exiting");
}

fn dup_cloexec(fd: RawFd) -> io::Result<OwnedFd> {
    let new_fd = unsafe { libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, 0) };
    if new_fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(new_fd) })
}

fn pipe_cloexec() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds: [libc::c_int; 2] = [0; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
        return Err(io::Error::last_os_error());
    }
    let (read_end, write_end) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    set_cloexec(&read_end)?;
    set_cloexec(&write_end)?;
    Ok((read_end, write_end))
}

fn set_cloexec(fd: &OwnedFd) -> io::Result<()> {
    unsafe {
        let flags = libc::fcntl(fd.as_raw_fd(), libc::F_GETFD);
        if flags == -1 || libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, flags | libc::FD_CLOEXEC) == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn dup2(from: RawFd, onto: RawFd) -> io::Result<()> {
    loop {
        if unsafe { libc::dup2(from, onto) } >= 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}
