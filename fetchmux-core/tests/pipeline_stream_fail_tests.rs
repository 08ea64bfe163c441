// fetchmux-core/tests/pipeline_stream_fail_tests.rs
//
// A failing download must tear the whole session down: the sibling stream
// is cancelled and the merge process is killed, without waiting on either.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use fetchmux_core::display::NullSink;
use fetchmux_core::tracker::StreamChannel;
use fetchmux_core::{CoreError, CoreResult, MergeSpec, SourceStream, run_with_sources};
use futures_util::StreamExt;
use futures_util::stream;
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

/// A source that yields one chunk and then never completes, standing in
/// for a healthy but slow download.
fn stalled_source() -> SourceStream {
    let chunks = stream::iter(vec![chunk(b"data")])
        .chain(stream::pending())
        .boxed();
    SourceStream::from_stream(None, chunks)
}

fn failing_source() -> SourceStream {
    SourceStream::from_chunks(
        Some(1000),
        vec![
            chunk(b"partial"),
            Err(CoreError::OperationFailed("connection reset".to_string())),
        ],
    )
}

#[tokio::test]
async fn test_audio_failure_terminates_session() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    // The stand-in never reads its inputs and never exits on its own, so
    // only an explicit kill can end it.
    let script = write_merger_script(dir.path(), "exec sleep 30");
    let merge = MergeSpec::new(&script, dir.path().join("out.mkv"));

    let mut sink = NullSink;
    let result = timeout(
        Duration::from_secs(10),
        run_with_sources(failing_source(), stalled_source(), merge, &mut sink),
    )
    .await
    .expect("session must terminate promptly, not wait out the merge process");

    let err = result.expect_err("a failed audio stream must fail the run");
    match err {
        CoreError::StreamFailed { channel, source } => {
            assert_eq!(channel, StreamChannel::Audio);
            assert!(
                matches!(*source, CoreError::OperationFailed(_)),
                "cause should be the download error, got: {source}"
            );
        }
        other => panic!("expected StreamFailed, got: {other}"),
    }

    Ok(())
}

#[tokio::test]
async fn test_video_failure_terminates_session() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let script = write_merger_script(dir.path(), "exec sleep 30");
    let merge = MergeSpec::new(&script, dir.path().join("out.mkv"));

    let mut sink = NullSink;
    let result = timeout(
        Duration::from_secs(10),
        run_with_sources(stalled_source(), failing_source(), merge, &mut sink),
    )
    .await
    .expect("session must terminate promptly, not wait out the merge process");

    let err = result.expect_err("a failed video stream must fail the run");
    assert!(
        matches!(
            err,
            CoreError::StreamFailed {
                channel: StreamChannel::Video,
                ..
            }
        ),
        "expected video StreamFailed, got: {err}"
    );

    Ok(())
}

#[tokio::test]
async fn test_stream_failure_reported_despite_clean_exit() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    // The stand-in takes the audio bytes that made it through, drains the
    // video channel, and exits zero. When the audio source then dies
    // mid-transfer, the download error must surface even though the merge
    // process finalized a (truncated) file and reported success.
    let script = write_merger_script(
        dir.path(),
        "head -c 4 0<&4 > /dev/null\n\
         cat 0<&5 > /dev/null\n\
         exit 0",
    );
    let merge = MergeSpec::new(&script, dir.path().join("out.mkv"));

    let audio = SourceStream::from_chunks(
        Some(1000),
        vec![
            chunk(b"aud!"),
            Err(CoreError::OperationFailed("connection reset".to_string())),
        ],
    );
    let video = SourceStream::from_chunks(Some(5), vec![chunk(b"video")]);

    let mut sink = NullSink;
    let result = timeout(
        Duration::from_secs(10),
        run_with_sources(audio, video, merge, &mut sink),
    )
    .await
    .expect("session must terminate promptly");

    let err = result.expect_err("a mid-transfer error must fail the run even on a clean merge exit");
    match err {
        CoreError::StreamFailed { channel, source } => {
            assert_eq!(channel, StreamChannel::Audio);
            assert!(
                matches!(*source, CoreError::OperationFailed(_)),
                "cause should be the download error, got: {source}"
            );
        }
        other => panic!("expected StreamFailed, got: {other}"),
    }

    Ok(())
}
