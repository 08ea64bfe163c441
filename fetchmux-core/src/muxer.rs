//! Merge subprocess control.
//!
//! Owns the ffmpeg process that muxes the downloaded audio and video into
//! one container. The child speaks a three-channel protocol on top of its
//! inherited stdio: `progress_out` (structured reports, descriptor 3),
//! `audio_in` (descriptor 4) and `video_in` (descriptor 5). The descriptor
//! numbers are an implementation detail of the invocation; callers only see
//! the named pipe ends.

use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use log::{debug, trace};
use tokio::io::AsyncReadExt;
use tokio::net::unix::pipe;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::error::{CoreError, CoreResult};
use crate::tracker::{MergeReport, PipelineEvent, ProgressEvent};

/// Descriptor numbers the child is told to use for each named channel.
const PROGRESS_OUT_FD: i32 = 3;
const AUDIO_IN_FD: i32 = 4;
const VIDEO_IN_FD: i32 = 5;

/// How the merge subprocess is invoked.
#[derive(Debug, Clone)]
pub struct MergeSpec {
    /// Encoder binary; ffmpeg in production, a stand-in under test.
    pub program: PathBuf,
    /// Final muxed output path.
    pub output: PathBuf,
}

impl MergeSpec {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), output: output.into() }
    }
}

/// A running merge subprocess with its named channel ends.
pub struct MergeChild {
    pub child: Child,
    /// Write side feeding the encoder's audio input.
    pub audio_in: pipe::Sender,
    /// Write side feeding the encoder's video input.
    pub video_in: pipe::Sender,
    /// Read side carrying the encoder's progress reports.
    pub progress_out: pipe::Receiver,
}

/// Builds the encoder argv: minimal verbosity, progress reports to the
/// progress channel, both inputs from their channels, audio mapped from
/// input 0, video stream-copied from input 1, output path last.
fn build_merge_args(output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-loglevel".into(),
        "8".into(),
        "-hide_banner".into(),
        "-progress".into(),
        format!("pipe:{PROGRESS_OUT_FD}").into(),
        "-i".into(),
        format!("pipe:{AUDIO_IN_FD}").into(),
        "-i".into(),
        format!("pipe:{VIDEO_IN_FD}").into(),
        "-map".into(),
        "0:a".into(),
        "-map".into(),
        "1:v".into(),
        "-c:v".into(),
        "copy".into(),
    ];
    args.push(output.as_os_str().to_os_string());
    args
}

/// Creates a pipe whose write side stays in this process (async) while the
/// read side goes to the child as a blocking descriptor.
fn inbound_pipe() -> CoreResult<(pipe::Sender, OwnedFd)> {
    let (tx, rx) = pipe::pipe()?;
    let child_end = rx.into_blocking_fd()?;
    Ok((tx, child_end))
}

/// Creates a pipe whose read side stays in this process (async) while the
/// write side goes to the child as a blocking descriptor.
fn outbound_pipe() -> CoreResult<(OwnedFd, pipe::Receiver)> {
    let (tx, rx) = pipe::pipe()?;
    let child_end = tx.into_blocking_fd()?;
    Ok((child_end, rx))
}

/// Moves a child-bound descriptor above the protocol range so the dup2
/// remapping in the child cannot clobber a source before it is copied.
fn lift_fd(fd: OwnedFd) -> io::Result<OwnedFd> {
    if fd.as_raw_fd() > VIDEO_IN_FD {
        return Ok(fd);
    }
    let raw = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_DUPFD_CLOEXEC, VIDEO_IN_FD + 1) };
    if raw < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(raw) })
}

/// Maps each pipe end onto the descriptor number the child expects. Runs
/// between fork and exec, so only async-signal-safe calls are allowed here.
fn remap_child_fds(mappings: [(i32, i32); 3]) -> io::Result<()> {
    for (src, dst) in mappings {
        // dup2 clears the close-on-exec flag on the target descriptor.
        if unsafe { libc::dup2(src, dst) } < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Spawns the merge subprocess with its three channel pipes wired up.
///
/// stdin/stdout/stderr are inherited so the encoder's own diagnostics stay
/// visible at its (minimal) log level. Spawn failure is reported before any
/// download starts.
pub fn spawn_merger(spec: &MergeSpec) -> CoreResult<MergeChild> {
    let (audio_in, audio_child) = inbound_pipe()?;
    let (video_in, video_child) = inbound_pipe()?;
    let (progress_child, progress_out) = outbound_pipe()?;

    let audio_child = lift_fd(audio_child)?;
    let video_child = lift_fd(video_child)?;
    let progress_child = lift_fd(progress_child)?;

    let mut command = Command::new(&spec.program);
    command
        .args(build_merge_args(&spec.output))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let mappings = [
        (progress_child.as_raw_fd(), PROGRESS_OUT_FD),
        (audio_child.as_raw_fd(), AUDIO_IN_FD),
        (video_child.as_raw_fd(), VIDEO_IN_FD),
    ];
    unsafe {
        command.pre_exec(move || remap_child_fds(mappings));
    }

    debug!("spawning merger: {} -> {}", spec.program.display(), spec.output.display());
    let child = command.spawn().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => CoreError::DependencyNotFound(spec.program.display().to_string()),
        _ => CoreError::CommandStart(spec.program.display().to_string(), e),
    })?;

    // The parent's copies of the child ends must close now, otherwise the
    // progress channel never reaches EOF and the child never sees EOF on an
    // abandoned input.
    drop(audio_child);
    drop(video_child);
    drop(progress_child);

    Ok(MergeChild { child, audio_in, video_in, progress_out })
}

/// Parses one progress chunk into a report.
///
/// A chunk holds newline-delimited `key=value` lines and may carry several
/// of them; all lines in the chunk fold into one record. Lines without `=`
/// are skipped, never an error. The caller replaces the previous report
/// with the result.
#[must_use]
pub fn parse_progress_chunk(chunk: &str) -> MergeReport {
    let mut fields = HashMap::new();
    for line in chunk.lines() {
        match line.split_once('=') {
            Some((key, value)) => {
                fields.insert(key.trim().to_string(), value.trim().to_string());
            }
            None => {
                if !line.trim().is_empty() {
                    trace!("skipping malformed progress line: {line:?}");
                }
            }
        }
    }
    MergeReport::from_fields(fields)
}

/// Reads the progress channel until EOF, emitting one parsed report per
/// chunk. Chunk boundaries follow the encoder's own write cadence.
pub async fn read_progress(mut progress_out: pipe::Receiver, events: mpsc::UnboundedSender<PipelineEvent>) {
    let mut buf = vec![0u8; 4096];
    loop {
        match progress_out.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let report = parse_progress_chunk(&String::from_utf8_lossy(&buf[..n]));
                if report.is_empty() {
                    continue;
                }
                if events.send(PipelineEvent::Progress(ProgressEvent::Merge(report))).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("progress channel read failed: {e}");
                break;
            }
        }
    }
}
