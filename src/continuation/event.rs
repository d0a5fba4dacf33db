//! Events that drive a turn

use crate::llm::{LlmError, TerminalStatus};
use crate::relay::RelayError;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum TurnEvent {
    /// Begin the turn
    Start,

    // Model collaborator events
    /// Provider accepted the request; the segment is ready to attach
    SegmentOpened,
    /// Provider refused the request before streaming
    RequestFailed(LlmError),
    /// The streaming segment reached its terminal status
    SegmentFinished(TerminalStatus),

    /// Internal: re-evaluate a `Deciding` state
    Evaluate,

    // Relay events
    /// Consumer disconnected
    Cancelled,
    /// Relay refused `attach`/`switch_source`
    RelayRejected(RelayError),
}
