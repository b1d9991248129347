//! Incremental model output.
//!
//! Providers hand back a byte stream (SSE or NDJSON). [`decode_lines`] turns
//! it into text fragments and [`TextStream::spawn`] moves the decoding onto a
//! background task that feeds a bounded channel. The consumer pulls fragments
//! in order; dropping the [`TextStream`] cancels the task, which drops the
//! HTTP response and releases the connection.

use brochure_common::{BrochureError, Result};
use brochure_http::ByteStream;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

const CHANNEL_CAPACITY: usize = 64;

/// Outcome of decoding one line of a provider stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStep {
    Text(String),
    Skip,
    Done,
}

/// Ordered, single-consumer sequence of text fragments.
pub struct TextStream {
    rx: mpsc::Receiver<Result<String>>,
    _guard: DropGuard,
}

impl TextStream {
    /// Drive `source` on a background task and expose its items.
    ///
    /// The pump stops after the first error, when the source ends, or as soon
    /// as the returned stream is dropped.
    pub fn spawn<S>(source: S) -> Self
    where
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            let mut source = Box::pin(source);
            loop {
                let next = tokio::select! {
                    _ = cancelled.cancelled() => {
                        tracing::debug!("llm.stream.cancelled");
                        break;
                    }
                    next = source.next() => next,
                };
                let Some(item) = next else { break };
                let failed = item.is_err();
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    sent = tx.send(item) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
                if failed {
                    break;
                }
            }
            tracing::trace!("llm.stream.pump_finished");
        });

        Self {
            rx,
            _guard: token.drop_guard(),
        }
    }

    /// A stream holding exactly one fragment. Needs no runtime.
    pub fn once(text: String) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(Ok(text));
        Self {
            rx,
            _guard: CancellationToken::new().drop_guard(),
        }
    }

    /// Drain the stream into one string, stopping at the first error.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut out = String::new();
        while let Some(fragment) = self.next().await {
            out.push_str(&fragment?);
        }
        Ok(out)
    }
}

impl Stream for TextStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl std::fmt::Debug for TextStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextStream").finish_non_exhaustive()
    }
}

/// Splits arbitrary byte chunks into complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    /// Append a chunk and return every line it completed, without terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            lines.push(decode_line(&line));
        }
        lines
    }

    /// Whatever is left after the final newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(decode_line(&rest))
    }
}

fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

/// Payload of an SSE `data:` line.
pub fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Decode a provider byte stream line by line with `parse`.
///
/// Empty fragments are dropped; a [`StreamStep::Done`] ends the stream even if
/// the server keeps the connection open.
pub fn decode_lines<F>(
    mut bytes: ByteStream,
    provider: &'static str,
    parse: F,
) -> impl Stream<Item = Result<String>> + Send + 'static
where
    F: Fn(&str) -> Result<StreamStep> + Send + 'static,
{
    async_stream::try_stream! {
        let mut buffer = LineBuffer::default();
        let mut done = false;
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| {
                BrochureError::Provider(format!("{provider}: stream interrupted: {e}"))
            })?;
            for line in buffer.push(&chunk) {
                match parse(&line)? {
                    StreamStep::Text(text) if !text.is_empty() => yield text,
                    StreamStep::Done => {
                        done = true;
                        break;
                    }
                    _ => {}
                }
            }
            if done {
                break;
            }
        }
        if !done {
            if let Some(line) = buffer.finish() {
                if let StreamStep::Text(text) = parse(&line)? {
                    if !text.is_empty() {
                        yield text;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn bytes_of(chunks: &[&'static str]) -> ByteStream {
        let items: Vec<std::result::Result<Bytes, brochure_http::HttpError>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        Box::pin(futures::stream::iter(items))
    }

    fn data_lines(line: &str) -> Result<StreamStep> {
        match sse_data(line) {
            Some("[DONE]") => Ok(StreamStep::Done),
            Some("boom") => Err(BrochureError::Provider("boom".into())),
            Some(data) => Ok(StreamStep::Text(data.to_string())),
            None => Ok(StreamStep::Skip),
        }
    }

    #[test]
    fn line_buffer_joins_split_chunks() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"data: hel").is_empty());
        assert_eq!(buf.push(b"lo\r\ndata: wor"), vec!["data: hello"]);
        assert_eq!(buf.push(b"ld\n\n"), vec!["data: world", ""]);
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn sse_data_strips_prefix() {
        assert_eq!(sse_data("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(sse_data("data:x"), Some("x"));
        assert_eq!(sse_data("event: ping"), None);
    }

    #[tokio::test]
    async fn decode_lines_stops_at_done() {
        let bytes = bytes_of(&["data: Hel", "lo\n\ndata: , wor", "ld\n", "data: [DONE]\n", "data: late\n"]);
        let stream = TextStream::spawn(decode_lines(bytes, "test", data_lines));
        assert_eq!(stream.collect_text().await.unwrap(), "Hello, world");
    }

    #[tokio::test]
    async fn decode_lines_flushes_trailing_line() {
        let bytes = bytes_of(&["data: a\n", "data: b"]);
        let stream = TextStream::spawn(decode_lines(bytes, "test", data_lines));
        assert_eq!(stream.collect_text().await.unwrap(), "ab");
    }

    #[tokio::test]
    async fn errors_end_the_stream() {
        let bytes = bytes_of(&["data: a\n", "data: boom\n", "data: c\n"]);
        let mut stream = TextStream::spawn(decode_lines(bytes, "test", data_lines));
        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn once_yields_single_fragment() {
        let mut stream = TextStream::once("# Acme".into());
        assert_eq!(stream.next().await.unwrap().unwrap(), "# Acme");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn dropping_the_stream_releases_the_source() {
        let (held_tx, held_rx) = oneshot::channel::<()>();
        let source = async_stream::stream! {
            let _held = held_tx;
            yield Ok::<_, BrochureError>("first".to_string());
            futures::future::pending::<()>().await;
        };

        let mut stream = TextStream::spawn(source);
        assert_eq!(stream.next().await.unwrap().unwrap(), "first");
        drop(stream);

        let released = tokio::time::timeout(Duration::from_secs(2), held_rx)
            .await
            .expect("source dropped after cancellation");
        assert!(released.is_err(), "sender dropped without sending");
    }
}
