//! Pipeline orchestration.
//!
//! `run` drives one full session: both stream downloads, the merge
//! process, and the progress display. All progress flows through a single
//! event channel so the display is updated from one place; the merge
//! process's exit is watched concurrently so a premature death is noticed
//! even while downloads are still moving.

use std::io::ErrorKind;
use std::time::Instant;

use log::{debug, warn};
use reqwest::Client;
use tokio::sync::mpsc;

use crate::PipelineSummary;
use crate::display::ProgressSink;
use crate::error::{CoreError, CoreResult};
use crate::muxer::{self, MergeChild, MergeSpec};
use crate::source::{self, SourceStream};
use crate::tracker::{PipelineEvent, ProgressEvent, SessionTracker, StreamChannel};

const CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Everything needed to run one session: where the streams come from and
/// how to merge them.
pub struct PipelinePlan {
    pub audio_url: String,
    pub video_url: String,
    pub merge: MergeSpec,
}

/// Opens both HTTP sources and runs the pipeline to completion.
pub async fn run(plan: PipelinePlan, sink: &mut dyn ProgressSink) -> CoreResult<PipelineSummary> {
    let client = Client::builder()
        .user_agent(concat!("fetchmux/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT)
        .build()?;

    let audio = open_source(&client, &plan.audio_url, StreamChannel::Audio).await?;
    let video = open_source(&client, &plan.video_url, StreamChannel::Video).await?;
    run_with_sources(audio, video, plan.merge, sink).await
}

async fn open_source(
    client: &Client,
    url: &str,
    channel: StreamChannel,
) -> CoreResult<SourceStream> {
    SourceStream::open_http(client, url)
        .await
        .map_err(|e| CoreError::StreamFailed {
            channel,
            source: Box::new(e),
        })
}

/// Runs the pipeline over already-opened sources. Split out from `run` so
/// sessions can be driven from non-HTTP streams.
pub async fn run_with_sources(
    audio: SourceStream,
    video: SourceStream,
    merge: MergeSpec,
    sink: &mut dyn ProgressSink,
) -> CoreResult<PipelineSummary> {
    let output_path = merge.output.clone();
    let mut tracker = SessionTracker::new();

    // Totals are known from the response headers before any chunk arrives;
    // seed them so the first frame already shows sizes.
    tracker.apply(ProgressEvent::Download {
        channel: StreamChannel::Audio,
        downloaded: 0,
        total: audio.total(),
    });
    tracker.apply(ProgressEvent::Download {
        channel: StreamChannel::Video,
        downloaded: 0,
        total: video.total(),
    });

    let MergeChild {
        mut child,
        audio_in,
        video_in,
        progress_out,
    } = muxer::spawn_merger(&merge)?;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let audio_task = tokio::spawn(source::pump(
        audio,
        audio_in,
        StreamChannel::Audio,
        events_tx.clone(),
    ));
    let video_task = tokio::spawn(source::pump(
        video,
        video_in,
        StreamChannel::Video,
        events_tx.clone(),
    ));
    let progress_task = tokio::spawn(muxer::read_progress(progress_out, events_tx));

    sink.update(&tracker);

    let mut audio_bytes = 0u64;
    let mut video_bytes = 0u64;
    let mut failure: Option<(StreamChannel, CoreError)> = None;
    let mut exit: Option<std::io::Result<std::process::ExitStatus>> = None;

    loop {
        tokio::select! {
            event = events_rx.recv() => match event {
                Some(PipelineEvent::Progress(event)) => {
                    tracker.apply(event);
                    sink.update(&tracker);
                }
                Some(PipelineEvent::StreamClosed { channel, bytes }) => {
                    debug!("{channel} stream finished after {bytes} bytes");
                    match channel {
                        StreamChannel::Audio => audio_bytes = bytes,
                        StreamChannel::Video => video_bytes = bytes,
                    }
                }
                Some(PipelineEvent::StreamFailed { channel, error }) => {
                    failure = Some((channel, error));
                    break;
                }
                None => break,
            },
            result = child.wait() => {
                exit = Some(result);
                break;
            }
        }
    }

    if let Some((channel, error)) = failure {
        audio_task.abort();
        video_task.abort();
        progress_task.abort();

        // A broken pipe usually means the merge process died first and the
        // write error is fallout, not cause.
        if let Ok(Some(status)) = child.try_wait() {
            if !status.success() && is_broken_pipe(&error) {
                warn!("merge process exited with {status} before the {channel} stream failed");
                return Err(CoreError::MergerFailed(status));
            }
        }

        debug!("terminating merge process after {channel} stream failure");
        let _ = child.start_kill();
        let _ = child.wait().await;
        return Err(CoreError::StreamFailed {
            channel,
            source: Box::new(error),
        });
    }

    let status = match exit {
        Some(result) => result?,
        None => child.wait().await?,
    };

    if !status.success() {
        audio_task.abort();
        video_task.abort();
        progress_task.abort();
        return Err(CoreError::MergerFailed(status));
    }

    // The pumps finished before the merger could see end of input, and the
    // progress reader stops at the pipe's EOF. Join them, then fold any
    // still-queued events into the final state.
    let _ = tokio::join!(audio_task, video_task, progress_task);
    while let Ok(event) = events_rx.try_recv() {
        match event {
            PipelineEvent::Progress(event) => tracker.apply(event),
            PipelineEvent::StreamClosed { channel, bytes } => match channel {
                StreamChannel::Audio => audio_bytes = bytes,
                StreamChannel::Video => video_bytes = bytes,
            },
            PipelineEvent::StreamFailed { channel, error } => {
                // Broken pipes are fallout of the merger closing its inputs.
                // Anything else is a real download failure that lost the
                // race against the exit notification.
                if is_broken_pipe(&error) {
                    debug!("late {channel} pipe error after merge exit: {error}");
                } else {
                    return Err(CoreError::StreamFailed {
                        channel,
                        source: Box::new(error),
                    });
                }
            }
        }
    }

    sink.finish(&tracker);

    Ok(PipelineSummary {
        output_path,
        audio_bytes: audio_bytes.max(tracker.audio.downloaded),
        video_bytes: video_bytes.max(tracker.video.downloaded),
        elapsed: tracker.elapsed_at(Instant::now()),
    })
}

fn is_broken_pipe(error: &CoreError) -> bool {
    matches!(error, CoreError::Io(e) if e.kind() == ErrorKind::BrokenPipe)
}
