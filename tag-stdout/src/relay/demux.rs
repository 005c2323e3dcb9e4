//! Splits a raw channel into newline-delimited lines.

use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

use super::{Emitter, Stream};
use crate::error::{RelayError, Result};

/// Bytes read since the last newline.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Feed a chunk and return every line it completes, in order.
    ///
    /// Newlines are consumed; all other bytes pass through untouched.
    pub fn split(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            lines.push(std::mem::take(&mut self.pending));
            rest = &rest[pos + 1..];
        }
        self.pending.extend_from_slice(rest);

        lines
    }

    /// Take the unterminated tail, if any.
    pub fn take_partial(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

/// Drains one channel and emits its lines.
#[derive(Debug)]
pub struct Demultiplexer<R> {
    stream: Stream,
    reader: R,
    emitter: Emitter,
    chunk_size: usize,
}

impl<R: AsyncRead + Unpin> Demultiplexer<R> {
    pub fn new(stream: Stream, reader: R, emitter: Emitter, chunk_size: usize) -> Self {
        Self {
            stream,
            reader,
            emitter,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Read until end-of-stream, emitting each line as it completes.
    ///
    /// A trailing line without a newline is emitted once the channel closes.
    /// Returns the number of lines emitted.
    pub async fn run(mut self) -> Result<u64> {
        let mut chunk = vec![0_u8; self.chunk_size];
        let mut buffer = LineBuffer::default();
        let mut emitted = 0_u64;

        loop {
            let n = match self.reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    if let Some(partial) = buffer.take_partial() {
                        self.emitter.emit(self.stream, partial).await?;
                    }
                    return Err(RelayError::Read {
                        stream: self.stream,
                        source,
                    });
                }
            };
            trace!(stream = %self.stream, bytes = n, "chunk read");

            for line in buffer.split(&chunk[..n]) {
                self.emitter.emit(self.stream, line).await?;
                emitted += 1;
            }
        }

        if let Some(partial) = buffer.take_partial() {
            self.emitter.emit(self.stream, partial).await?;
            emitted += 1;
        }

        debug!(stream = %self.stream, lines = emitted, "channel closed");
        Ok(emitted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::relay::spawn_writer;

    async fn relay(input: &'static [u8], chunk_size: usize) -> (u64, Vec<u8>) {
        let (emitter, writer) = spawn_writer(Arc::from(&b"X"[..]), Vec::new(), Vec::new(), 8);
        let lines = Demultiplexer::new(Stream::Out, input, emitter, chunk_size)
            .run()
            .await
            .unwrap();
        let (out, err) = writer.await.unwrap().unwrap();
        assert!(err.is_empty());
        (lines, out)
    }

    #[test]
    fn test_split_across_chunks() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.split(b"hel").is_empty());
        assert_eq!(buffer.split(b"lo\nwor"), vec![b"hello".to_vec()]);
        assert_eq!(buffer.split(b"ld\n\n"), vec![b"world".to_vec(), Vec::new()]);
        assert_eq!(buffer.take_partial(), None);
    }

    #[test]
    fn test_partial_tail() {
        let mut buffer = LineBuffer::default();
        assert_eq!(buffer.split(b"a\nb"), vec![b"a".to_vec()]);
        assert_eq!(buffer.take_partial(), Some(b"b".to_vec()));
        assert_eq!(buffer.take_partial(), None);
    }

    #[tokio::test]
    async fn test_hello() {
        let (lines, out) = relay(b"hello\n", 8192).await;
        assert_eq!(lines, 1);
        assert_eq!(out, b"[O]:X: hello\n");
    }

    #[tokio::test]
    async fn test_partial_line_flushed_once() {
        let (lines, out) = relay(b"partial", 8192).await;
        assert_eq!(lines, 1);
        assert_eq!(out, b"[O]:X: partial\n");
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let (lines, out) = relay(b"", 8192).await;
        assert_eq!(lines, 0);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_line_count_matches_newlines() {
        let input: &[u8] = b"a\n\nb\nccc\r\nlast";
        let (lines, out) = relay(input, 3).await;
        assert_eq!(lines, 5);
        assert_eq!(out, b"[O]:X: a\n[O]:X: \n[O]:X: b\n[O]:X: ccc\r\n[O]:X: last\n");
    }

    #[tokio::test]
    async fn test_chunk_size_does_not_change_output() {
        let input: &'static [u8] = b"first line\nsecond\nthird and longer line\n";
        let (_, whole) = relay(input, 8192).await;
        for chunk_size in [1, 2, 5, 7] {
            let (lines, out) = relay(input, chunk_size).await;
            assert_eq!(lines, 3);
            assert_eq!(out, whole);
        }
    }

    #[tokio::test]
    async fn test_err_stream_uses_err_sink() {
        let (emitter, writer) = spawn_writer(Arc::from(&b"X"[..]), Vec::new(), Vec::new(), 8);
        let input: &[u8] = b"oops\n";
        Demultiplexer::new(Stream::Err, input, emitter, 64)
            .run()
            .await
            .unwrap();
        let (out, err) = writer.await.unwrap().unwrap();
        assert!(out.is_empty());
        assert_eq!(err, b"[E]:X: oops\n");
    }
}
