// fetchmux-core/tests/pipeline_success_tests.rs

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use fetchmux_core::display::ProgressSink;
use fetchmux_core::tracker::SessionTracker;
use fetchmux_core::{CoreResult, MergeSpec, SourceStream, run_with_sources};
use tempfile::tempdir;
use tokio::time::timeout;

// Helper to create an executable stand-in for the merge process.
fn write_merger_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-merger.sh");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write script");
    let mut perms = fs::metadata(&path).expect("Failed to stat script").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("Failed to chmod script");
    path
}

fn chunk(data: &[u8]) -> CoreResult<Bytes> {
    Ok(Bytes::copy_from_slice(data))
}

#[derive(Default)]
struct RecordingSink {
    updates: usize,
    finishes: usize,
    last_frame: String,
    last_audio_bytes: u64,
    last_video_bytes: u64,
}

impl ProgressSink for RecordingSink {
    fn update(&mut self, tracker: &SessionTracker) {
        self.updates += 1;
        self.last_frame = tracker.merge.frame().to_string();
        self.last_audio_bytes = tracker.audio.downloaded;
        self.last_video_bytes = tracker.video.downloaded;
    }

    fn finish(&mut self, tracker: &SessionTracker) {
        self.finishes += 1;
        self.last_frame = tracker.merge.frame().to_string();
        self.last_audio_bytes = tracker.audio.downloaded;
        self.last_video_bytes = tracker.video.downloaded;
    }
}

#[tokio::test]
async fn test_pipeline_success_reports_summary() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    // The stand-in drains both input channels, emits one progress report
    // on the progress channel, and exits cleanly.
    let script = write_merger_script(
        dir.path(),
        "cat 0<&4 > /dev/null\n\
         cat 0<&5 > /dev/null\n\
         printf 'frame=42\\nfps=30.0\\nspeed=1.5x\\n' >&3\n\
         exit 0",
    );

    let audio = SourceStream::from_chunks(
        Some(10),
        vec![chunk(b"aaaa"), chunk(b"bbbb"), chunk(b"cc")],
    );
    let video = SourceStream::from_chunks(Some(20), vec![chunk(&[0u8; 20])]);

    let output = dir.path().join("out.mkv");
    let merge = MergeSpec::new(&script, &output);

    let mut sink = RecordingSink::default();
    let summary = timeout(
        Duration::from_secs(10),
        run_with_sources(audio, video, merge, &mut sink),
    )
    .await
    .expect("pipeline should not hang")?;

    // --- Assertions ---
    assert_eq!(summary.output_path, output);
    assert_eq!(summary.audio_bytes, 10, "all audio bytes should be counted");
    assert_eq!(summary.video_bytes, 20, "all video bytes should be counted");

    assert!(sink.updates > 0, "sink should see progress updates");
    assert_eq!(sink.finishes, 1, "sink should be finished exactly once");
    assert_eq!(sink.last_frame, "42", "final merge report should reach the sink");
    assert_eq!(sink.last_audio_bytes, 10);
    assert_eq!(sink.last_video_bytes, 20);

    Ok(())
}

#[tokio::test]
async fn test_pipeline_success_with_empty_streams() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let script = write_merger_script(
        dir.path(),
        "cat 0<&4 > /dev/null\n\
         cat 0<&5 > /dev/null\n\
         exit 0",
    );

    let audio = SourceStream::from_chunks(Some(0), Vec::new());
    let video = SourceStream::from_chunks(Some(0), Vec::new());
    let merge = MergeSpec::new(&script, dir.path().join("empty.mkv"));

    let mut sink = RecordingSink::default();
    let summary = timeout(
        Duration::from_secs(10),
        run_with_sources(audio, video, merge, &mut sink),
    )
    .await
    .expect("pipeline should not hang")?;

    assert_eq!(summary.audio_bytes, 0);
    assert_eq!(summary.video_bytes, 0);
    assert_eq!(sink.finishes, 1);

    Ok(())
}
