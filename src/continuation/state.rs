//! Turn state types

use super::TurnError;

/// Per-turn controller state
///
/// `segment` is the 1-based index of the segment being requested or
/// streamed. Switch count is always `segment - 1`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnState {
    /// Nothing requested yet
    #[default]
    Init,

    /// Waiting for the model collaborator to accept a request
    Requesting { segment: u32 },

    /// Segment attached to the relay, waiting for its terminal status
    Streaming { segment: u32 },

    /// Segment ended truncated; decide whether to continue
    Deciding { segment: u32, partial: String },

    /// Final segment completed, relay closed cleanly
    Done { segments: u32 },

    /// Turn failed; the relay was error-closed or torn down
    Failed { error: TurnError },
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Done { .. } | TurnState::Failed { .. })
    }

    /// Segment currently in flight, if any
    pub fn segment(&self) -> Option<u32> {
        match self {
            TurnState::Requesting { segment }
            | TurnState::Streaming { segment }
            | TurnState::Deciding { segment, .. } => Some(*segment),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TurnState::Init => "init",
            TurnState::Requesting { .. } => "requesting",
            TurnState::Streaming { .. } => "streaming",
            TurnState::Deciding { .. } => "deciding",
            TurnState::Done { .. } => "done",
            TurnState::Failed { .. } => "failed",
        }
    }
}

/// Immutable per-turn settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnContext {
    /// Maximum segments for the turn, at least 1
    pub max_segments: u32,
}

impl TurnContext {
    pub fn new(max_segments: u32) -> Self {
        Self {
            max_segments: max_segments.max(1),
        }
    }
}
