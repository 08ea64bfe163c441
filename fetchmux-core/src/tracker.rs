//! Session-scoped progress state and the events that feed it.
//!
//! One `SessionTracker` exists per pipeline run, owned by the orchestrator's
//! event loop and threaded through by reference. All three channels (audio
//! download, video download, merge) report through the same fan-in event
//! stream, so the tracker never assumes any ordering between them.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::error::CoreError;

/// Identifies one of the two download channels feeding the merger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamChannel {
    Audio,
    Video,
}

impl fmt::Display for StreamChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamChannel::Audio => write!(f, "audio"),
            StreamChannel::Video => write!(f, "video"),
        }
    }
}

/// Latest download sample for one channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelProgress {
    /// Bytes received so far. Monotonically non-decreasing within a run.
    pub downloaded: u64,
    /// Total size, once the remote has reported one.
    pub total: Option<u64>,
}

impl ChannelProgress {
    /// Percentage complete, clamped to [0, 100]. `None` while the total is
    /// unknown.
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        let total = self.total?;
        if total == 0 {
            return Some(100.0);
        }
        Some(((self.downloaded as f64 / total as f64) * 100.0).clamp(0.0, 100.0))
    }

    fn record(&mut self, downloaded: u64, total: Option<u64>) {
        // Stale samples never move the bar backwards, and the first reported
        // total wins for the rest of the run.
        self.downloaded = self.downloaded.max(downloaded);
        if self.total.is_none() {
            self.total = total;
        }
    }
}

/// One structured progress report from the merge subprocess.
///
/// Each report wholesale-replaces the previous one; values stay as the
/// strings the encoder emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    fields: HashMap<String, String>,
}

impl MergeReport {
    #[must_use]
    pub fn from_fields(fields: HashMap<String, String>) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn frame(&self) -> &str {
        self.get("frame").unwrap_or("0")
    }

    #[must_use]
    pub fn fps(&self) -> &str {
        self.get("fps").unwrap_or("0")
    }

    #[must_use]
    pub fn speed(&self) -> &str {
        self.get("speed").unwrap_or("0x")
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A progress sample from one of the three pipeline channels.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Download {
        channel: StreamChannel,
        downloaded: u64,
        total: Option<u64>,
    },
    Merge(MergeReport),
}

/// Fan-in message for the pipeline event loop: a progress sample, or the
/// terminal outcome of a pump task.
#[derive(Debug)]
pub enum PipelineEvent {
    Progress(ProgressEvent),
    StreamClosed { channel: StreamChannel, bytes: u64 },
    StreamFailed { channel: StreamChannel, error: CoreError },
}

/// Progress state for one pipeline run.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    started_at: Instant,
    pub audio: ChannelProgress,
    pub video: ChannelProgress,
    pub merge: MergeReport,
}

impl SessionTracker {
    /// Creates a tracker whose clock starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            audio: ChannelProgress::default(),
            video: ChannelProgress::default(),
            merge: MergeReport::default(),
        }
    }

    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Wall-clock time between pipeline start and `now`.
    #[must_use]
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.duration_since(self.started_at)
    }

    /// Folds one event into the tracker. Infallible; later events never move
    /// progress backwards, and merge reports replace the previous snapshot
    /// wholesale.
    pub fn apply(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Download { channel, downloaded, total } => match channel {
                StreamChannel::Audio => self.audio.record(downloaded, total),
                StreamChannel::Video => self.video.record(downloaded, total),
            },
            ProgressEvent::Merge(report) => self.merge = report,
        }
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}
