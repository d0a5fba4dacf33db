//! Relay error types

use crate::llm::LlmError;
use thiserror::Error;

/// Errors reported by the relay, both to control callers and to the sink
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// `close()` or a failure already ended the session
    #[error("relay is already closed")]
    AlreadyClosed,
    /// A producer is active (attach) or another switch is already waiting (switch)
    #[error("a producer is already active or queued")]
    SwitchWhileActive,
    /// The consumer went away; the active producer was cancelled
    #[error("consumer disconnected")]
    Cancelled,
    /// The active producer failed mid-stream
    #[error("segment failed: {0}")]
    Segment(LlmError),
    /// The session was closed with an error by its controller
    #[error("{0}")]
    Aborted(String),
}

impl RelayError {
    /// Whether this is a control-protocol violation rather than a runtime failure
    pub fn is_misuse(&self) -> bool {
        matches!(self, RelayError::AlreadyClosed | RelayError::SwitchWhileActive)
    }
}
