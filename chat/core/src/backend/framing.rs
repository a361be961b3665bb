//! Line framing for streamed response bodies
//!
//! Both wire formats this crate speaks (newline-delimited JSON and
//! server-sent events) are line oriented. Network chunks do not respect line
//! or even UTF-8 boundaries, so bytes are accumulated and only complete lines
//! are decoded.

use std::fmt;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};

use super::error::ChatError;
use super::traits::RawFragmentStream;

/// Splits a byte stream into text lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: BytesMut,
    /// Prefix of `buf` already searched without finding a newline
    scanned: usize,
}

impl LineBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from the network
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Take the next complete line, without its terminator
    ///
    /// Returns `None` until a full line is buffered. A trailing `\r` is
    /// stripped. Invalid UTF-8 is reported as `Some(Err(..))` and the line
    /// is consumed. Bytes already searched are not searched again.
    pub fn next_line(&mut self) -> Option<Result<String, std::str::Utf8Error>> {
        let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') else {
            self.scanned = self.buf.len();
            return None;
        };
        let pos = self.scanned + offset;
        self.scanned = 0;
        let line = self.buf.split_to(pos + 1);
        Some(decode(&line[..pos]))
    }

    /// Whether nothing is buffered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

fn decode(bytes: &[u8]) -> Result<String, std::str::Utf8Error> {
    let text = std::str::from_utf8(bytes)?;
    Ok(text.strip_suffix('\r').unwrap_or(text).to_string())
}

/// What one decoded line contributes to a fragment stream
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LineEvent {
    /// Text to forward, if any; empty text is dropped
    pub content: Option<String>,
    /// The backend signalled the end of the response
    pub done: bool,
}

impl LineEvent {
    /// A line carrying nothing (blank lines, comments, keep-alives)
    #[must_use]
    pub fn skip() -> Self {
        Self::default()
    }
}

/// Turn a streamed response body into raw fragments
///
/// Each complete line goes through `parse`. The stream ends after a line
/// with `done`, after the first error (yielded as its last item), or when
/// the body ends; an unterminated final line is parsed as if it were
/// complete.
pub fn decode_body<B, E, F>(body: B, backend: &'static str, mut parse: F) -> RawFragmentStream
where
    B: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: fmt::Display + Send,
    F: FnMut(&str) -> Result<LineEvent, ChatError> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut body = Box::pin(body);
        let mut lines = LineBuffer::new();
        let mut body_ended = false;

        loop {
            match body.next().await {
                Some(Ok(bytes)) => lines.extend(&bytes),
                Some(Err(e)) => {
                    let detail = e.to_string();
                    tracing::warn!(backend, error = %detail, "Response stream interrupted");
                    yield Err(ChatError::Transport {
                        backend: backend.to_string(),
                        detail,
                    });
                    return;
                }
                None => {
                    if !lines.is_empty() {
                        lines.extend(b"\n");
                    }
                    body_ended = true;
                }
            }

            while let Some(line) = lines.next_line() {
                let parsed = match line {
                    Ok(text) => parse(&text),
                    Err(e) => Err(ChatError::Framing {
                        backend: backend.to_string(),
                        detail: e.to_string(),
                    }),
                };

                match parsed {
                    Ok(event) => {
                        if let Some(content) = event.content.filter(|c| !c.is_empty()) {
                            yield Ok(content);
                        }
                        if event.done {
                            tracing::debug!(backend, "Response stream completed");
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(backend, error = ?e, "Malformed response line");
                        yield Err(e);
                        return;
                    }
                }
            }

            if body_ended {
                tracing::debug!(backend, "Response stream ended without an end marker");
                return;
            }
        }
    })
}
