//! Bridge to an external duplex byte channel
//!
//! Transform logic that is only available as a byte-stream interface (a child
//! process pipe, a socket, an in-memory duplex) can be spliced into a pipeline
//! with [`pass_through`]. Upstream chunks are written into the channel by a
//! writer task; whatever the channel produces is read back and emitted.

use super::EventStream;
use crate::error::{ProcessorError, Result};
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Write `upstream` into `channel` and emit what the channel reads back
///
/// The write side is shut down once upstream completes so the peer sees EOF.
/// The result completes when the channel's read side ends. A read error, a
/// write error or an upstream error aborts the writer before the error is
/// forwarded, and so does dropping the result.
///
/// Nothing happens until the result is first polled: the writer task is
/// spawned then, so that first poll must come from within a tokio runtime.
pub fn pass_through<B, S, C>(upstream: S, channel: C) -> EventStream<Bytes>
where
    B: AsRef<[u8]> + Send + 'static,
    S: Stream<Item = Result<B>> + Send + 'static,
    C: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(channel);

    PassThrough {
        pending: Some((upstream.boxed(), writer)),
        reader: ReaderStream::new(reader),
        writer: None,
        terminated: false,
    }
    .boxed()
}

fn spawn_writer<B, C>(
    mut upstream: BoxStream<'static, Result<B>>,
    mut writer: WriteHalf<C>,
) -> JoinHandle<Result<()>>
where
    B: AsRef<[u8]> + Send + 'static,
    C: AsyncWrite + Send + 'static,
{
    tokio::spawn(async move {
        let mut written = 0usize;
        while let Some(chunk) = upstream.next().await {
            let chunk = chunk?;
            writer.write_all(chunk.as_ref()).await?;
            written += chunk.as_ref().len();
        }
        writer.shutdown().await?;
        debug!(bytes = written, "pass-through write side finished");
        Ok::<(), ProcessorError>(())
    })
}

struct PassThrough<B, C> {
    /// Upstream and write half, until the writer is started
    pending: Option<(BoxStream<'static, Result<B>>, WriteHalf<C>)>,
    reader: ReaderStream<ReadHalf<C>>,
    writer: Option<JoinHandle<Result<()>>>,
    terminated: bool,
}

impl<B, C> PassThrough<B, C> {
    fn dispose_writer(&mut self) {
        self.pending = None;
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
    }

    fn fail(&mut self, error: ProcessorError) -> Poll<Option<Result<Bytes>>> {
        self.dispose_writer();
        self.terminated = true;
        Poll::Ready(Some(Err(error)))
    }
}

impl<B, C> Stream for PassThrough<B, C>
where
    B: AsRef<[u8]> + Send + 'static,
    C: AsyncRead + AsyncWrite + Send + 'static,
{
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.terminated {
            return Poll::Ready(None);
        }

        if let Some((upstream, writer)) = this.pending.take() {
            this.writer = Some(spawn_writer(upstream, writer));
        }

        if let Some(writer) = this.writer.as_mut() {
            if let Poll::Ready(outcome) = Pin::new(writer).poll(cx) {
                this.writer = None;
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => {
                        warn!(error = %error, "pass-through write side failed");
                        return this.fail(error);
                    }
                    Err(join_error) => return this.fail(join_error.into()),
                }
            }
        }

        match this.reader.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(Some(Err(error))) => this.fail(error.into()),
            Poll::Ready(None) => {
                // The peer may close its write side before draining ours.
                this.dispose_writer();
                this.terminated = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<B, C> Drop for PassThrough<B, C> {
    fn drop(&mut self) {
        self.dispose_writer();
    }
}
