//! Stream adapters over the child's stdio handles
//!
//! Each adapter runs on its own task so a read parked on a pipe never blocks
//! the supervisor. Output adapters push chunks into a bounded channel that
//! the caller drains as a [`Stream`]; the input adapter pulls chunks from a
//! channel and writes them to the child.

use futures::Stream;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, trace};

use crate::error::{ProcessError, Result};

/// Chunks buffered per adapter before backpressure kicks in
pub const CHANNEL_CAPACITY: usize = 16;

/// Which output handle an adapter reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// Why an output adapter stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterOutcome {
    /// The handle reached end of stream
    EndOfStream,
    /// No data arrived within the idle timeout
    TimedOut,
    /// Reading failed
    Failed(String),
    /// The consumer dropped the source
    Detached,
}

/// Push-style source of chunks read from stdout or stderr
///
/// Yields `Err` at most once, as its last item, on idle timeout or read failure.
#[derive(Debug)]
pub struct OutputSource {
    kind: StreamKind,
    chunks: ReceiverStream<Result<Vec<u8>>>,
}

impl OutputSource {
    /// Start an adapter task over `reader`
    ///
    /// `on_terminated` runs exactly once when the task stops, whatever the reason.
    pub fn spawn<R, F>(
        kind: StreamKind,
        reader: R,
        buffer_size: usize,
        idle_timeout: Option<Duration>,
        on_terminated: F,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        F: FnOnce(StreamKind, AdapterOutcome) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let outcome = pump_source(kind, reader, buffer_size, idle_timeout, tx).await;
            debug!(stream = %kind, outcome = ?outcome, "Output adapter terminated");
            on_terminated(kind, outcome);
        });

        Self {
            kind,
            chunks: ReceiverStream::new(rx),
        }
    }

    /// Which handle this source reads
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Next chunk, or `None` once the adapter has terminated
    pub async fn next_chunk(&mut self) -> Option<Result<Vec<u8>>> {
        self.chunks.next().await
    }

    /// Collect everything until the adapter terminates
    pub async fn read_to_end(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next_chunk().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }
}

impl Stream for OutputSource {
    type Item = Result<Vec<u8>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.chunks).poll_next(cx)
    }
}

async fn pump_source<R>(
    kind: StreamKind,
    mut reader: R,
    buffer_size: usize,
    idle_timeout: Option<Duration>,
    tx: mpsc::Sender<Result<Vec<u8>>>,
) -> AdapterOutcome
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; buffer_size];
    loop {
        let read = tokio::select! {
            read = read_with_timeout(&mut reader, &mut buf, idle_timeout) => read,
            _ = tx.closed() => return AdapterOutcome::Detached,
        };

        match read {
            Some(Ok(0)) => return AdapterOutcome::EndOfStream,
            Some(Ok(n)) => {
                trace!(stream = %kind, bytes = n, "Read chunk");
                if tx.send(Ok(buf[..n].to_vec())).await.is_err() {
                    return AdapterOutcome::Detached;
                }
            }
            Some(Err(e)) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Some(Err(e)) => {
                let reason = e.to_string();
                let _ = tx.send(Err(ProcessError::Io { stream: kind, source: e })).await;
                return AdapterOutcome::Failed(reason);
            }
            None => {
                let millis = idle_timeout.map_or(0, |d| d.as_millis() as u64);
                let _ = tx.send(Err(ProcessError::StdioTimeout { stream: kind, millis })).await;
                return AdapterOutcome::TimedOut;
            }
        }
    }
}

/// `None` means the idle timeout elapsed
async fn read_with_timeout<R>(
    reader: &mut R,
    buf: &mut [u8],
    idle_timeout: Option<Duration>,
) -> Option<std::io::Result<usize>>
where
    R: AsyncRead + Unpin,
{
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, reader.read(buf)).await.ok(),
        None => Some(reader.read(buf).await),
    }
}

/// Pull-style sink relaying chunks to the child's stdin
///
/// Dropping the sink or calling [`InputSink::close`] closes stdin once the
/// queued chunks have been written.
#[derive(Debug)]
pub struct InputSink {
    tx: mpsc::Sender<Vec<u8>>,
}

impl InputSink {
    /// Start an adapter task over `writer`
    pub fn spawn<W>(writer: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(pump_sink(writer, rx));
        Self { tx }
    }

    /// Queue a chunk for the child
    pub async fn send(&self, chunk: impl Into<Vec<u8>>) -> Result<()> {
        self.tx
            .send(chunk.into())
            .await
            .map_err(|_| ProcessError::StdinClosed)
    }

    /// Whether the child's stdin can still take data
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Signal end of input
    pub fn close(self) {
        drop(self.tx);
    }
}

async fn pump_sink<W>(mut writer: W, mut rx: mpsc::Receiver<Vec<u8>>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(chunk) = rx.recv().await {
        let written = match writer.write_all(&chunk).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            debug!(error = %e, "Input adapter stopped writing");
            return;
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!(error = %e, "Failed to close process stdin");
    }
    debug!("Input adapter closed");
}

/// The three endpoints handed to the caller on start
#[derive(Debug)]
pub struct StdioStreams {
    pub stdin: InputSink,
    pub stdout: OutputSource,
    pub stderr: OutputSource,
}
