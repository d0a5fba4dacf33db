//! Effects produced by state transitions

use crate::relay::RelayError;

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Ask the model collaborator for a segment over the current log
    RequestSegment { segment: u32 },

    /// Install the opened segment as the relay's first producer
    Attach,

    /// Hand the opened segment to the relay as the next producer
    SwitchSource,

    /// Append the partial text and the continuation directive to the log
    AppendContinuation { partial: String },

    /// Close the relay once the last producer drains
    CloseRelay,

    /// Error-close the relay
    FailRelay { error: RelayError },
}

impl Effect {
    pub fn fail_relay(error: RelayError) -> Self {
        Effect::FailRelay { error }
    }

    pub fn abort_relay(reason: impl ToString) -> Self {
        Effect::FailRelay {
            error: RelayError::Aborted(reason.to_string()),
        }
    }
}
