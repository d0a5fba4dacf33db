//! Pure state transition function

use super::{Effect, TurnContext, TurnError, TurnEvent, TurnState};
use crate::llm::TerminalStatus;
use crate::relay::RelayError;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: TurnState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TurnState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Turn already finished ({0})")]
    Finished(&'static str),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
pub fn transition(
    state: &TurnState,
    context: &TurnContext,
    event: TurnEvent,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Terminal states accept nothing
        (TurnState::Done { .. } | TurnState::Failed { .. }, _) => {
            Err(TransitionError::Finished(state.name()))
        }

        // ============================================================
        // Starting a segment
        // ============================================================
        (TurnState::Init, TurnEvent::Start) => {
            Ok(TransitionResult::new(TurnState::Requesting { segment: 1 })
                .with_effect(Effect::RequestSegment { segment: 1 }))
        }

        (TurnState::Requesting { segment }, TurnEvent::SegmentOpened) => {
            let effect = if *segment == 1 {
                Effect::Attach
            } else {
                Effect::SwitchSource
            };
            Ok(TransitionResult::new(TurnState::Streaming { segment: *segment }).with_effect(effect))
        }

        // Nothing reached the consumer yet: the caller sees a setup failure
        (TurnState::Requesting { segment: 1 }, TurnEvent::RequestFailed(err)) => {
            Ok(TransitionResult::new(TurnState::Failed {
                error: TurnError::Setup(err),
            }))
        }

        // Earlier segments already streamed: terminate the sink abnormally
        (TurnState::Requesting { .. }, TurnEvent::RequestFailed(err)) => {
            Ok(TransitionResult::new(TurnState::Failed {
                error: TurnError::Segment(err.clone()),
            })
            .with_effect(Effect::fail_relay(RelayError::Segment(err))))
        }

        // ============================================================
        // Segment outcome
        // ============================================================
        (TurnState::Streaming { segment }, TurnEvent::SegmentFinished(status)) => match status {
            TerminalStatus::Completed(_) => {
                Ok(TransitionResult::new(TurnState::Done { segments: *segment })
                    .with_effect(Effect::CloseRelay))
            }
            TerminalStatus::Truncated(partial) => Ok(TransitionResult::new(TurnState::Deciding {
                segment: *segment,
                partial,
            })),
            TerminalStatus::Error(err) => Ok(TransitionResult::new(TurnState::Failed {
                error: TurnError::Segment(err.clone()),
            })
            .with_effect(Effect::fail_relay(RelayError::Segment(err)))),
        },

        // ============================================================
        // Continuation decision
        // ============================================================
        (TurnState::Deciding { segment, partial }, TurnEvent::Evaluate) => {
            if *segment >= context.max_segments {
                let error = TurnError::SegmentLimit {
                    max: context.max_segments,
                };
                let effect = Effect::abort_relay(&error);
                return Ok(TransitionResult::new(TurnState::Failed { error }).with_effect(effect));
            }

            let next = segment + 1;
            Ok(TransitionResult::new(TurnState::Requesting { segment: next })
                .with_effect(Effect::AppendContinuation {
                    partial: partial.clone(),
                })
                .with_effect(Effect::RequestSegment { segment: next }))
        }

        // ============================================================
        // Cancellation and relay refusals
        // ============================================================

        // The relay already tore itself down; nothing to close
        (_, TurnEvent::Cancelled) => Ok(TransitionResult::new(TurnState::Failed {
            error: TurnError::Cancelled,
        })),

        (_, TurnEvent::RelayRejected(err)) => {
            let error = TurnError::Relay(err);
            let effect = Effect::abort_relay(&error);
            Ok(TransitionResult::new(TurnState::Failed { error }).with_effect(effect))
        }

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {state:?} with event {event:?}"
        ))),
    }
}
