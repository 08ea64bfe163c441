//! Core library for downloading split audio/video streams and merging them
//! with ffmpeg.
//!
//! This crate provides media probing, stream selection, parallel stream
//! download with backpressure, merge process control over dedicated file
//! descriptors, and live progress tracking.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use fetchmux_core::{MergeSpec, PipelinePlan, pipeline};
//! use fetchmux_core::display::ConsoleDisplay;
//!
//! # async fn example() -> fetchmux_core::CoreResult<()> {
//! let plan = PipelinePlan {
//!     audio_url: "https://cdn.example/audio".to_string(),
//!     video_url: "https://cdn.example/video".to_string(),
//!     merge: MergeSpec::new("ffmpeg", "/path/to/My_Video.mkv"),
//! };
//!
//! let mut display = ConsoleDisplay::new();
//! let summary = pipeline::run(plan, &mut display).await?;
//! println!("wrote {}", summary.output_path.display());
//! # Ok(())
//! # }
//! ```

pub mod display;
pub mod error;
pub mod estimate;
pub mod muxer;
pub mod outpath;
pub mod pipeline;
pub mod probe;
pub mod source;
pub mod tracker;

// Re-exports for public API
pub use display::{ConsoleDisplay, NullSink, ProgressSink};
pub use error::{CoreError, CoreResult};
pub use estimate::{estimate_remaining, format_eta, format_mb};
pub use muxer::MergeSpec;
pub use outpath::{resolve_output_path, sanitize_title};
pub use pipeline::{PipelinePlan, run, run_with_sources};
pub use probe::{
    MediaInfo, StreamVariant, check_dependency, dedup_variants, probe_media, select_audio,
    select_video,
};
pub use source::SourceStream;
pub use tracker::{SessionTracker, StreamChannel};

use std::path::PathBuf;
use std::time::Duration;

/// Result of a completed pipeline run, with statistics about the session.
///
/// Returned by `pipeline::run` once the merge process has exited cleanly.
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub output_path: PathBuf,
    pub audio_bytes: u64,
    pub video_bytes: u64,
    pub elapsed: Duration,
}
