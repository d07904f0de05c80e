// Backpressure-aware byte streams
//
// Every stream here is pull-driven: nothing is read from upstream (or from a
// child process) until the consumer asks for the next chunk. Dropping a
// stream tears down whatever feeds it.

use std::io;

use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;

use super::errors::DownloadError;

/// Chunk size used when reading child process output
const CHUNK_SIZE: usize = 64 * 1024;

/// A pull-based stream of media bytes
pub type MediaStream = BoxStream<'static, Result<Bytes, io::Error>>;

/// Wrap an upstream HTTP response body
pub fn from_response(response: reqwest::Response) -> MediaStream {
    response.bytes_stream().map_err(io::Error::other).boxed()
}

/// Background task copying bytes into a child's stdin.
///
/// Aborted when dropped so a cancelled download stops feeding immediately.
pub struct Feeder(JoinHandle<io::Result<u64>>);

impl Feeder {
    pub fn new(handle: JoinHandle<io::Result<u64>>) -> Self {
        Self(handle)
    }

    async fn finish(&mut self) -> io::Result<()> {
        match (&mut self.0).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(io::Error::other(format!("input task failed: {}", e))),
        }
    }
}

impl Drop for Feeder {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct ProcessState {
    reader: ReaderStream<ChildStdout>,
    child: Child,
    feeder: Option<Feeder>,
    label: &'static str,
}

/// Stream a child's stdout.
///
/// The child must be spawned with `kill_on_drop(true)`: dropping the stream
/// (client disconnect) kills it. A non-zero exit, or a failed feeder, is
/// reported as a trailing error so the response is aborted rather than
/// silently truncated.
pub fn from_child(
    mut child: Child,
    feeder: Option<Feeder>,
    label: &'static str,
) -> Result<MediaStream, DownloadError> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| DownloadError::Streaming(format!("Failed to capture stdout from {}", label)))?;

    let state = ProcessState {
        reader: ReaderStream::with_capacity(stdout, CHUNK_SIZE),
        child,
        feeder,
        label,
    };

    let stream = stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        match state.reader.next().await {
            Some(Ok(chunk)) => Some((Ok(chunk), Some(state))),
            Some(Err(e)) => Some((Err(e), None)),
            None => match finish_process(&mut state).await {
                Ok(()) => None,
                Err(e) => Some((Err(e), None)),
            },
        }
    });

    Ok(stream.boxed())
}

async fn finish_process(state: &mut ProcessState) -> io::Result<()> {
    if let Some(feeder) = state.feeder.as_mut() {
        feeder.finish().await?;
    }

    let status = state.child.wait().await?;
    if status.success() {
        tracing::debug!(process = state.label, "process finished");
        Ok(())
    } else {
        Err(io::Error::other(format!("{} exited with {}", state.label, status)))
    }
}

/// Wait for the first chunk before any response headers are committed.
///
/// Start-up failures then surface as a structured error instead of an
/// aborted body. The chunk is re-emitted ahead of the rest of the stream.
pub async fn prime(mut body: MediaStream) -> Result<MediaStream, DownloadError> {
    match body.next().await {
        Some(Ok(first)) => Ok(stream::once(async move { Ok::<_, io::Error>(first) })
            .chain(body)
            .boxed()),
        Some(Err(e)) => Err(DownloadError::Streaming(e.to_string())),
        None => Ok(stream::empty().boxed()),
    }
}
