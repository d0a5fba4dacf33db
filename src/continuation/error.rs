//! Turn failure reasons

use crate::llm::LlmError;
use crate::relay::RelayError;
use thiserror::Error;

/// Why a turn ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    /// The first segment could not be obtained; nothing was streamed
    #[error("failed to start response: {0}")]
    Setup(LlmError),
    /// A segment failed after the response began
    #[error("response failed mid-stream: {0}")]
    Segment(LlmError),
    /// The model kept truncating past the segment budget
    #[error("segment limit reached ({max} segments)")]
    SegmentLimit { max: u32 },
    /// The relay refused an attach or switch
    #[error("relay rejected segment: {0}")]
    Relay(RelayError),
    /// The consumer disconnected
    #[error("turn cancelled by consumer")]
    Cancelled,
    /// The controller received an event its state cannot handle
    #[error("turn protocol error: {0}")]
    Protocol(String),
}

impl TurnError {
    pub fn kind(&self) -> &'static str {
        match self {
            TurnError::Setup(_) => "setup",
            TurnError::Segment(_) => "segment",
            TurnError::SegmentLimit { .. } => "segment_limit",
            TurnError::Relay(_) => "relay",
            TurnError::Cancelled => "cancelled",
            TurnError::Protocol(_) => "protocol",
        }
    }
}
