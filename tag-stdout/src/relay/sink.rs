//! Serialized output for relayed lines.
//!
//! Both demultiplexers send finished lines over a bounded channel to a single
//! writer task. The writer owns both sinks, so one line is always written in
//! full before the next one starts.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::trace;

use super::{RelayLine, Stream};
use crate::error::{RelayError, Result};

/// Handle to the writer task; resolves to the sinks once every [`Emitter`]
/// has been dropped and the queue is drained.
pub type WriterHandle<O, E> = JoinHandle<Result<(O, E)>>;

/// Sending half of the output queue. Cheap to clone, one per demultiplexer.
#[derive(Debug, Clone)]
pub struct Emitter {
    tx: mpsc::Sender<RelayLine>,
}

impl Emitter {
    /// Queue one line for output.
    ///
    /// Waits only while the queue is full.
    pub async fn emit(&self, stream: Stream, text: Vec<u8>) -> Result<()> {
        self.tx
            .send(RelayLine::new(stream, text))
            .await
            .map_err(|_| RelayError::SinkClosed(stream))
    }
}

/// Render a line as `<MARKER>:<TAG>: <LINE>\n`.
pub fn render_line(tag: &[u8], line: &RelayLine) -> Vec<u8> {
    let marker = line.stream().marker();
    let text = line.text();
    let mut rendered = Vec::with_capacity(marker.len() + tag.len() + text.len() + 4);
    rendered.extend_from_slice(marker.as_bytes());
    rendered.push(b':');
    rendered.extend_from_slice(tag);
    rendered.extend_from_slice(b": ");
    rendered.extend_from_slice(text);
    rendered.push(b'\n');
    rendered
}

/// Start the writer task.
///
/// OUT lines go to `out`, ERR lines to `err`. The task ends when every
/// [`Emitter`] is dropped, handing both sinks back.
pub fn spawn_writer<O, E>(
    tag: Arc<[u8]>,
    out: O,
    err: E,
    capacity: usize,
) -> (Emitter, WriterHandle<O, E>)
where
    O: AsyncWrite + Unpin + Send + 'static,
    E: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<RelayLine>(capacity.max(1));

    let handle = tokio::spawn(async move {
        let mut out = out;
        let mut err = err;
        let mut lines = ReceiverStream::new(rx);
        let mut written = 0_u64;

        while let Some(line) = lines.next().await {
            let rendered = render_line(&tag, &line);
            match line.stream() {
                Stream::Out => write_line(&mut out, &rendered).await?,
                Stream::Err => write_line(&mut err, &rendered).await?,
            }
            written += 1;
        }

        trace!(written, "output queue closed");
        Ok((out, err))
    });

    (Emitter { tx }, handle)
}

async fn write_line<W: AsyncWrite + Unpin>(sink: &mut W, rendered: &[u8]) -> Result<()> {
    sink.write_all(rendered).await.map_err(RelayError::Write)?;
    sink.flush().await.map_err(RelayError::Write)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_format() {
        let line = RelayLine::new(Stream::Out, b"hello".to_vec());
        assert_eq!(render_line(b"X", &line), b"[O]:X: hello\n");

        let line = RelayLine::new(Stream::Err, b"oops".to_vec());
        assert_eq!(render_line(b"X", &line), b"[E]:X: oops\n");
    }

    #[test]
    fn test_render_keeps_raw_bytes() {
        let line = RelayLine::new(Stream::Out, vec![0xff, b'\r', b'a']);
        assert_eq!(render_line(b"t", &line), b"[O]:t: \xff\ra\n");
    }

    #[test]
    fn test_render_tag_verbatim() {
        let line = RelayLine::new(Stream::Err, b"x".to_vec());
        assert_eq!(render_line(b"-web\xfe", &line), b"[E]:-web\xfe: x\n");
    }

    #[test]
    fn test_render_empty_line() {
        let line = RelayLine::new(Stream::Out, Vec::new());
        assert_eq!(render_line(b"tag", &line), b"[O]:tag: \n");
    }

    #[tokio::test]
    async fn test_writer_routes_by_stream() {
        let (emitter, handle) = spawn_writer(Arc::from(&b"X"[..]), Vec::new(), Vec::new(), 4);

        emitter.emit(Stream::Out, b"one".to_vec()).await.unwrap();
        emitter.emit(Stream::Err, b"two".to_vec()).await.unwrap();
        emitter.emit(Stream::Out, b"three".to_vec()).await.unwrap();
        drop(emitter);

        let (out, err) = handle.await.unwrap().unwrap();
        assert_eq!(out, b"[O]:X: one\n[O]:X: three\n");
        assert_eq!(err, b"[E]:X: two\n");
    }

    #[tokio::test]
    async fn test_writer_waits_for_every_emitter() {
        let (emitter, handle) = spawn_writer(Arc::from(&b"X"[..]), Vec::new(), Vec::new(), 1);
        let second = emitter.clone();

        let task = tokio::spawn(async move {
            for i in 0..50 {
                second.emit(Stream::Err, format!("e{i}").into_bytes()).await.unwrap();
            }
        });
        for i in 0..50 {
            emitter.emit(Stream::Out, format!("o{i}").into_bytes()).await.unwrap();
        }
        drop(emitter);
        task.await.unwrap();

        let (out, err) = handle.await.unwrap().unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 50);
        assert_eq!(String::from_utf8(err).unwrap().lines().count(), 50);
    }

    #[tokio::test]
    async fn test_emit_after_writer_gone() {
        let (emitter, handle) = spawn_writer(Arc::from(&b"X"[..]), Vec::new(), Vec::new(), 1);
        handle.abort();
        let _ = handle.await;

        let result = emitter.emit(Stream::Out, b"late".to_vec()).await;
        assert!(matches!(result, Err(RelayError::SinkClosed(Stream::Out))));
    }
}
