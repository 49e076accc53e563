use std::{pin::Pin, process::Stdio, time::Duration};

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::process::{config::StreamSource, decoder::LineDecoder, error::ProcessError};

/// Capacity of the scratch buffer used for a single read.
pub const BUFFER_SIZE: usize = 50_000;

/// How long a final drain waits for more bytes before giving up.
///
/// Descendants of the child may keep the write end open after the child
/// itself has exited, so draining cannot wait for end-of-stream forever.
pub const DRAIN_IDLE_TIMEOUT: Duration = Duration::from_millis(50);

type PipeReader = Pin<Box<dyn AsyncRead + Send>>;

/// Read end of a pipe connected to a child process stream.
///
/// A pending [`read`](Self::read) future is the outstanding read request: it
/// resolves as soon as the child writes something, and dropping it cancels
/// the request without losing data, which makes it usable from
/// `tokio::select!`.
///
/// A pipe starts closed. [`create`](Self::create) hands out the write end for
/// the child, [`attach`](Self::attach) takes the read end once the child has
/// been spawned.
pub struct AsyncPipe {
    source: StreamSource,
    reader: Option<PipeReader>,
    buffer: Box<[u8]>,
    closed: bool,
}

impl std::fmt::Debug for AsyncPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncPipe")
            .field("source", &self.source)
            .field("attached", &self.reader.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}

impl AsyncPipe {
    pub fn new(source: StreamSource) -> Self {
        Self {
            source,
            reader: None,
            buffer: vec![0u8; BUFFER_SIZE].into_boxed_slice(),
            closed: true,
        }
    }

    /// Allocates the pipe and returns the write end to give to the child.
    ///
    /// The OS pipe itself is created by the runtime when the command is
    /// spawned; the read end must then be passed to [`attach`](Self::attach).
    pub fn create(&mut self) -> Stdio {
        self.closed = false;
        Stdio::piped()
    }

    /// Takes ownership of the read end of the pipe.
    pub fn attach<R>(&mut self, reader: R)
    where
        R: AsyncRead + Send + 'static,
    {
        self.reader = Some(Box::pin(reader));
        self.closed = false;
    }

    /// Whether the pipe has reached end-of-stream or failed.
    pub fn closed(&self) -> bool {
        self.closed
    }

    pub fn source(&self) -> StreamSource {
        self.source
    }

    /// Moves newly available bytes into `sink`.
    ///
    /// Without `finish`, this waits for the next chunk and returns the number
    /// of bytes read; `0` means the child closed its end. With `finish`, the
    /// pipe is drained until end-of-stream or until nothing arrives for
    /// [`DRAIN_IDLE_TIMEOUT`], and is closed afterwards.
    ///
    /// A read error closes the pipe and is returned as
    /// [`ProcessError::StreamReadFailure`]; whatever was read before stays in
    /// `sink`.
    pub async fn read(
        &mut self,
        finish: bool,
        sink: &mut LineDecoder,
    ) -> Result<usize, ProcessError> {
        if finish {
            return self.drain(sink).await;
        }

        let Some(reader) = self.reader.as_mut() else {
            self.closed = true;
            return Ok(0);
        };
        if self.closed {
            return Ok(0);
        }

        match reader.read(&mut self.buffer).await {
            Ok(0) => {
                self.close();
                Ok(0)
            }
            Ok(n) => {
                sink.add(&self.buffer[..n]);
                Ok(n)
            }
            Err(e) => {
                self.close();
                Err(self.read_failure(e))
            }
        }
    }

    async fn drain(&mut self, sink: &mut LineDecoder) -> Result<usize, ProcessError> {
        let mut total = 0;

        while !self.closed {
            let Some(reader) = self.reader.as_mut() else {
                break;
            };

            match tokio::time::timeout(DRAIN_IDLE_TIMEOUT, reader.read(&mut self.buffer)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    sink.add(&self.buffer[..n]);
                    total += n;
                }
                Ok(Err(e)) => {
                    self.close();
                    return Err(self.read_failure(e));
                }
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(stream = %self.source, "pipe still open after drain, abandoning");
                    break;
                }
            }
        }

        self.close();
        Ok(total)
    }

    fn close(&mut self) {
        self.closed = true;
        self.reader = None;
    }

    fn read_failure(&self, e: std::io::Error) -> ProcessError {
        #[cfg(feature = "tracing")]
        tracing::warn!(stream = %self.source, error = %e, "pipe read failed");

        ProcessError::StreamReadFailure {
            stream: self.source,
            message: e.to_string(),
        }
    }
}
