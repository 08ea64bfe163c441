//! Stream sources: long-lived, cancellable byte streams with progress
//! reporting.
//!
//! A source yields chunks at the remote's own cadence. `pump` forwards them
//! into a merge input channel; because each chunk is written with
//! `write_all`, the source only pulls from the network as fast as the
//! encoder drains the pipe. Nothing buffers beyond one in-flight chunk.

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use log::debug;
use reqwest::Client;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::{CoreError, CoreResult};
use crate::tracker::{PipelineEvent, ProgressEvent, StreamChannel};

/// A byte stream heading into one merge input, with its total size when the
/// remote reported one.
pub struct SourceStream {
    total: Option<u64>,
    chunks: BoxStream<'static, CoreResult<Bytes>>,
}

impl SourceStream {
    /// Opens an HTTP source. The request is issued and the status checked
    /// immediately; the body is consumed lazily by `pump`.
    pub async fn open_http(client: &Client, url: &str) -> CoreResult<Self> {
        let response = client.get(url).send().await?.error_for_status()?;
        let total = response.content_length();
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(CoreError::from))
            .boxed();
        Ok(Self { total, chunks })
    }

    /// Wraps an arbitrary chunk stream.
    #[must_use]
    pub fn from_stream(total: Option<u64>, chunks: BoxStream<'static, CoreResult<Bytes>>) -> Self {
        Self { total, chunks }
    }

    /// Builds a source from an in-memory chunk sequence.
    #[must_use]
    pub fn from_chunks(total: Option<u64>, chunks: Vec<CoreResult<Bytes>>) -> Self {
        Self::from_stream(total, futures_util::stream::iter(chunks).boxed())
    }

    #[must_use]
    pub fn total(&self) -> Option<u64> {
        self.total
    }
}

/// Forwards a source into its merge input channel.
///
/// One progress event is sent per chunk, at the source's cadence. The
/// terminal outcome is reported as a `StreamClosed` or `StreamFailed`
/// event; the sink is dropped only after that event is queued, so the
/// orchestrator learns about a failure before the encoder can react to the
/// closed channel.
pub async fn pump<W>(
    mut source: SourceStream,
    mut sink: W,
    channel: StreamChannel,
    events: mpsc::UnboundedSender<PipelineEvent>,
) where
    W: AsyncWrite + Unpin,
{
    let result = copy_chunks(&mut source, &mut sink, channel, &events).await;

    let outcome = match result {
        Ok(bytes) => PipelineEvent::StreamClosed { channel, bytes },
        Err(error) => PipelineEvent::StreamFailed { channel, error },
    };
    if events.send(outcome).is_err() {
        debug!("{channel} pump finished after the event loop closed");
    }
    drop(sink);
}

async fn copy_chunks<W>(
    source: &mut SourceStream,
    sink: &mut W,
    channel: StreamChannel,
    events: &mpsc::UnboundedSender<PipelineEvent>,
) -> CoreResult<u64>
where
    W: AsyncWrite + Unpin,
{
    let total = source.total;
    let mut downloaded = 0u64;

    while let Some(chunk) = source.chunks.next().await {
        let chunk = chunk?;
        sink.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        let _ = events.send(PipelineEvent::Progress(ProgressEvent::Download {
            channel,
            downloaded,
            total,
        }));
    }

    sink.flush().await?;
    Ok(downloaded)
}
