//! Segments: one generation stream plus its terminal status
//!
//! A provider hands back a [`Segment`] as soon as its response headers
//! arrive. The body is fed through a bounded channel, so a provider task
//! never reads further ahead of the relay than the channel capacity.
//! The terminal status resolves once the provider has emitted its last
//! byte (or failed).

use super::{FinishReason, LlmError};
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

/// Byte body of a segment
pub type SegmentBody = BoxStream<'static, Result<Bytes, LlmError>>;

/// Tagged outcome of one segment. The text is everything the segment produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalStatus {
    Completed(String),
    Truncated(String),
    Error(LlmError),
}

impl TerminalStatus {
    /// Map a provider stop reason: only a length stop is a truncation.
    pub fn from_finish(reason: &FinishReason, text: String) -> Self {
        if reason.is_truncation() {
            TerminalStatus::Truncated(text)
        } else {
            TerminalStatus::Completed(text)
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            TerminalStatus::Completed(_) => "completed",
            TerminalStatus::Truncated(_) => "truncated",
            TerminalStatus::Error(_) => "error",
        }
    }
}

/// Pending terminal status of a segment
#[derive(Debug)]
pub struct SegmentStatus(oneshot::Receiver<TerminalStatus>);

impl SegmentStatus {
    /// Wait for the producer to finish. A producer that went away without
    /// reporting counts as an error.
    pub async fn wait(self) -> TerminalStatus {
        self.0.await.unwrap_or_else(|_| {
            TerminalStatus::Error(LlmError::network(
                "Segment producer ended without a terminal status",
            ))
        })
    }
}

/// One underlying generation stream
pub struct Segment {
    body: SegmentBody,
    status: SegmentStatus,
}

impl Segment {
    pub fn new(body: SegmentBody, status: oneshot::Receiver<TerminalStatus>) -> Self {
        Self {
            body,
            status: SegmentStatus(status),
        }
    }

    /// Create a segment fed by the returned writer.
    pub fn channel(buffer: usize) -> (SegmentWriter, Segment) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let (status_tx, status_rx) = oneshot::channel();
        let writer = SegmentWriter {
            tx,
            status: status_tx,
            text: String::new(),
        };
        let segment = Segment::new(ReceiverStream::new(rx).boxed(), status_rx);
        (writer, segment)
    }

    pub fn into_parts(self) -> (SegmentBody, SegmentStatus) {
        (self.body, self.status)
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment").finish_non_exhaustive()
    }
}

/// Producer side of a segment
pub struct SegmentWriter {
    tx: mpsc::Sender<Result<Bytes, LlmError>>,
    status: oneshot::Sender<TerminalStatus>,
    text: String,
}

impl SegmentWriter {
    /// Forward a text delta. Returns `false` once the reader is gone.
    pub async fn push_text(&mut self, delta: &str) -> bool {
        if delta.is_empty() {
            return !self.tx.is_closed();
        }
        self.text.push_str(delta);
        self.tx
            .send(Ok(Bytes::copy_from_slice(delta.as_bytes())))
            .await
            .is_ok()
    }

    /// Resolves when the reader side has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }

    /// Report a normal end of stream with the provider's stop reason.
    pub fn finish(self, reason: &FinishReason) {
        let status = TerminalStatus::from_finish(reason, self.text);
        let _ = self.status.send(status);
    }

    /// Fail the segment: the error goes into the body and the status.
    pub async fn fail(self, error: LlmError) {
        let _ = self.tx.send(Err(error.clone())).await;
        let _ = self.status.send(TerminalStatus::Error(error));
    }
}
