//! Full-screen progress rendering.
//!
//! The frame is rebuilt from scratch on every tracker update and the screen
//! is cleared before each write, so the display never accumulates duplicate
//! scrollback. Frame building is a pure function; only `ConsoleDisplay`
//! touches the terminal, and its write failures are logged and swallowed
//! because rendering must never take down the pipeline.

use std::time::{Duration, Instant};

use console::Term;
use log::debug;

use crate::estimate::{estimate_remaining, format_eta, format_mb};
use crate::tracker::{ChannelProgress, SessionTracker};

/// Width of the block-character progress bar.
const BAR_BLOCKS: usize = 20;

/// Renders a percentage as a 20-block bar with a two-decimal readout,
/// e.g. `[████████░░░░░░░░░░░░] 42.00%`.
#[must_use]
pub fn progress_bar(percentage: f64) -> String {
    let filled = ((BAR_BLOCKS as f64 * percentage) / 100.0).round() as usize;
    let filled = filled.min(BAR_BLOCKS);
    let empty = BAR_BLOCKS - filled;
    format!("[{}{}] {:.2}%", "█".repeat(filled), "░".repeat(empty), percentage)
}

fn channel_lines(frame: &mut String, label: &str, name: &str, channel: &ChannelProgress, elapsed: Duration) {
    let percentage = channel.percentage().unwrap_or(0.0);
    frame.push_str(&format!("{label} | {}\n", progress_bar(percentage)));

    let eta = estimate_remaining(elapsed, channel.downloaded, channel.total);
    frame.push_str(&format!("Estimated time left for {name}: {}\n", format_eta(eta)));

    let total_text = match channel.total {
        Some(total) => format!("{}MB", format_mb(total)),
        None => "unknown".to_string(),
    };
    frame.push_str(&format!(" ({}MB of {})\n\n", format_mb(channel.downloaded), total_text));
}

/// Builds the complete progress frame for one tracker snapshot at `now`.
#[must_use]
pub fn render_frame(tracker: &SessionTracker, now: Instant) -> String {
    let elapsed = tracker.elapsed_at(now);
    let mut frame = String::new();

    channel_lines(&mut frame, "Audio ", "audio", &tracker.audio, elapsed);
    channel_lines(&mut frame, "Video ", "video", &tracker.video, elapsed);

    frame.push_str(&format!("Merged | processing frame {}\n", tracker.merge.frame()));
    frame.push_str(&format!("(at {} fps => {})\n\n", tracker.merge.fps(), tracker.merge.speed()));

    frame.push_str(&format!("running for: {:.2} minutes\n", elapsed.as_secs_f64() / 60.0));
    frame
}

/// Consumes tracker updates from the pipeline event loop. `update` runs
/// exactly once per applied event; `finish` once after a successful merge.
pub trait ProgressSink: Send {
    fn update(&mut self, tracker: &SessionTracker);
    fn finish(&mut self, tracker: &SessionTracker);
}

/// Full-screen console renderer: clears the terminal and redraws the whole
/// frame on every update.
pub struct ConsoleDisplay {
    term: Term,
}

impl ConsoleDisplay {
    #[must_use]
    pub fn new() -> Self {
        Self { term: Term::stdout() }
    }

    fn draw(&self, frame: &str) {
        if let Err(e) = self.try_draw(frame) {
            debug!("progress render failed: {e}");
        }
    }

    fn try_draw(&self, frame: &str) -> std::io::Result<()> {
        self.term.clear_screen()?;
        // Long lines are truncated to the terminal width so a narrow window
        // cannot wrap the frame and defeat the clear-and-redraw scheme.
        if let Some((_, width)) = self.term.size_checked() {
            for line in frame.lines() {
                self.term.write_line(&console::truncate_str(line, width as usize, ""))?;
            }
        } else {
            self.term.write_str(frame)?;
        }
        Ok(())
    }
}

impl Default for ConsoleDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleDisplay {
    fn update(&mut self, tracker: &SessionTracker) {
        self.draw(&render_frame(tracker, Instant::now()));
    }

    fn finish(&mut self, tracker: &SessionTracker) {
        self.draw(&render_frame(tracker, Instant::now()));
        if let Err(e) = self.term.write_line("\ndone") {
            debug!("progress render failed: {e}");
        }
    }
}

/// No-op sink for headless runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn update(&mut self, _tracker: &SessionTracker) {}

    fn finish(&mut self, _tracker: &SessionTracker) {}
}
