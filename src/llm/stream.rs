//! Shared plumbing for streaming provider responses
//!
//! Providers speak either Server-Sent Events (Anthropic, Gemini) or
//! newline-delimited JSON (Ollama). Both are line oriented, so a single
//! line buffer sits under an SSE event assembler. Each provider supplies a
//! [`PartDecoder`] that turns raw bytes into [`StreamPart`]s, and [`pump`]
//! moves those parts into a [`SegmentWriter`].

use super::{FinishReason, LlmError, SegmentWriter, StreamPart};
use bytes::Bytes;
use futures::{Stream, StreamExt};

/// Splits a byte stream into lines, tolerating chunk boundaries that fall
/// inside a line or inside a multi-byte character.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Feed bytes and return every completed line (without terminator).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Flush whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// One Server-Sent Event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Assembles SSE events from lines
#[derive(Debug, Default)]
pub struct SseDecoder {
    lines: LineBuffer,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let lines = self.lines.push(chunk);
        let mut events = Vec::new();
        for line in lines {
            if let Some(event) = self.feed_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing event that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if let Some(line) = self.lines.finish() {
            if let Some(event) = self.feed_line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        Some(SseEvent {
            event: self.event.take(),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

/// Provider-specific decoding of a response body
pub trait PartDecoder: Send {
    /// Decode the next chunk of the response body.
    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<StreamPart>, LlmError>;

    /// Called once the body has ended. Must yield a `Finish` part (or an
    /// error) if the provider never reported one.
    fn end(&mut self) -> Result<Vec<StreamPart>, LlmError>;
}

/// Drive a provider response body into a segment.
///
/// Stops early if the segment reader goes away, which drops the HTTP
/// response and with it the upstream connection.
pub async fn pump<S, D>(mut body: S, mut decoder: D, mut writer: SegmentWriter)
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + Unpin,
    D: PartDecoder,
{
    let mut finish: Option<FinishReason> = None;

    loop {
        let chunk = tokio::select! {
            () = writer.closed() => {
                tracing::debug!("Segment reader dropped, abandoning provider stream");
                return;
            }
            chunk = body.next() => chunk,
        };

        let ended = chunk.is_none();
        let parts = match chunk {
            Some(Ok(bytes)) => decoder.feed(&bytes),
            Some(Err(e)) => Err(LlmError::network(format!("Stream interrupted: {e}"))),
            None => decoder.end(),
        };

        let parts = match parts {
            Ok(parts) => parts,
            Err(e) => {
                writer.fail(e).await;
                return;
            }
        };

        for part in parts {
            match part {
                StreamPart::Delta(text) => {
                    if !writer.push_text(&text).await {
                        return;
                    }
                }
                StreamPart::Finish(reason) => finish = Some(reason),
            }
        }

        if ended {
            break;
        }
    }

    match finish {
        Some(reason) => writer.finish(&reason),
        None => {
            writer
                .fail(LlmError::network("Stream ended without a stop reason"))
                .await;
        }
    }
}
