//! Audio sources feeding a recognition session.
//!
//! A source yields chunks until it reports end of stream. The session only
//! reads from it; closing it (through [`AudioCloser`] or by dropping an
//! [`AudioSender`]) is how a caller ends the audio early.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Read size used when streaming from a reader.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Pull-based audio input.
#[async_trait]
pub trait AudioSource: Send {
    /// Next chunk, or `Ok(None)` at end of stream.
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>>;
}

#[async_trait]
impl<S: AudioSource + ?Sized> AudioSource for Box<S> {
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        (**self).next_chunk().await
    }
}

/// Closes a [`ReaderSource`] from outside the session.
#[derive(Debug, Clone, Default)]
pub struct AudioCloser {
    token: CancellationToken,
}

impl AudioCloser {
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

// =============================================================================
// Reader Source
// =============================================================================

/// Streams any [`AsyncRead`] in fixed-size reads.
pub struct ReaderSource<R> {
    reader: R,
    chunk_size: usize,
    closer: AudioCloser,
}

impl<R> ReaderSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            chunk_size: DEFAULT_CHUNK_SIZE,
            closer: AudioCloser::default(),
        }
    }

    /// Zero is treated as [`DEFAULT_CHUNK_SIZE`].
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        self
    }

    /// Handle that ends the stream; a pending read is abandoned.
    pub fn closer(&self) -> AudioCloser {
        self.closer.clone()
    }
}

impl ReaderSource<File> {
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path).await?;
        Ok(Self::new(file))
    }
}

#[async_trait]
impl<R> AudioSource for ReaderSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        if self.closer.is_closed() {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.chunk_size];
        let read = tokio::select! {
            biased;
            _ = self.closer.token.cancelled() => return Ok(None),
            read = self.reader.read(&mut buf) => read?,
        };

        if read == 0 {
            return Ok(None);
        }
        buf.truncate(read);
        Ok(Some(Bytes::from(buf)))
    }
}

// =============================================================================
// Channel Source
// =============================================================================

/// Create a push-model source. The stream ends once every [`AudioSender`]
/// is closed or dropped.
pub fn channel(capacity: usize) -> (AudioSender, ChannelSource) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (AudioSender { tx }, ChannelSource { rx })
}

#[derive(Debug, Clone)]
pub struct AudioSender {
    tx: mpsc::Sender<Bytes>,
}

impl AudioSender {
    /// Waits for buffer space. Fails with `BrokenPipe` once the session has
    /// stopped reading.
    pub async fn send(&self, chunk: impl Into<Bytes>) -> io::Result<()> {
        self.tx.send(chunk.into()).await.map_err(|_| {
            io::Error::new(io::ErrorKind::BrokenPipe, "recognition session is gone")
        })
    }

    pub fn close(self) {}

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Bytes>,
}

#[async_trait]
impl AudioSource for ChannelSource {
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        Ok(self.rx.recv().await)
    }
}

// =============================================================================
// Memory Source
// =============================================================================

/// Serves an in-memory buffer in fixed-size chunks.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
    chunk_size: usize,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

#[async_trait]
impl AudioSource for MemorySource {
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        if self.data.is_empty() {
            return Ok(None);
        }
        let len = self.chunk_size.min(self.data.len());
        Ok(Some(self.data.split_to(len)))
    }
}
