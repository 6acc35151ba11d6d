//! Bounded accumulation of a child's output streams

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Read size for each pipe read
pub(crate) const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stream {
    Stdout,
    Stderr,
}

/// A piece of output read from one stream
#[derive(Debug)]
pub(crate) struct Chunk {
    pub stream: Stream,
    pub data: Vec<u8>,
}

/// Marker returned once a stream went over the cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Overflow;

/// Per-stream byte accumulator with a hard cap
#[derive(Debug)]
pub(crate) struct OutputCapture {
    cap: usize,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    overflowed: bool,
}

impl OutputCapture {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            stdout: Vec::new(),
            stderr: Vec::new(),
            overflowed: false,
        }
    }

    /// Append a chunk, keeping at most `cap` bytes per stream
    ///
    /// Returns `Err(Overflow)` the first time and every subsequent time a stream
    /// would exceed the cap.
    pub fn push(&mut self, chunk: Chunk) -> Result<(), Overflow> {
        let cap = self.cap;
        let buffer = match chunk.stream {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => &mut self.stderr,
        };

        let room = cap.saturating_sub(buffer.len());
        if chunk.data.len() > room {
            buffer.extend_from_slice(&chunk.data[..room]);
            self.overflowed = true;
            return Err(Overflow);
        }

        buffer.extend_from_slice(&chunk.data);
        Ok(())
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.stdout, self.stderr)
    }
}

/// Forward everything read from `reader` to `tx` until EOF or the receiver is gone
pub(crate) fn spawn_reader<R>(
    mut reader: R,
    stream: Stream,
    tx: mpsc::Sender<Chunk>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = Chunk {
                        stream,
                        data: buf[..n].to_vec(),
                    };
                    if tx.send(chunk).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(?stream, error = %e, "stream read failed");
                    break;
                }
            }
        }
    })
}
