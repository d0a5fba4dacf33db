//! Property-based tests for the turn state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::*;
use crate::llm::{LlmError, TerminalStatus};
use crate::relay::RelayError;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_llm_error() -> impl Strategy<Value = LlmError> {
    ("[a-z ]{1,20}", 0u8..4).prop_map(|(message, kind)| match kind {
        0 => LlmError::network(message),
        1 => LlmError::rate_limit(message),
        2 => LlmError::server_error(message),
        _ => LlmError::unknown(message),
    })
}

fn arb_status() -> impl Strategy<Value = TerminalStatus> {
    prop_oneof![
        "[a-z ]{0,10}".prop_map(TerminalStatus::Completed),
        "[a-z ]{0,10}".prop_map(TerminalStatus::Truncated),
        arb_llm_error().prop_map(TerminalStatus::Error),
    ]
}

fn arb_event() -> impl Strategy<Value = TurnEvent> {
    prop_oneof![
        Just(TurnEvent::Start),
        Just(TurnEvent::SegmentOpened),
        arb_llm_error().prop_map(TurnEvent::RequestFailed),
        arb_status().prop_map(TurnEvent::SegmentFinished),
        Just(TurnEvent::Evaluate),
        Just(TurnEvent::Cancelled),
        Just(TurnEvent::RelayRejected(RelayError::SwitchWhileActive)),
    ]
}

/// Outcome a well-behaved collaborator reports for each segment
fn arb_outcomes() -> impl Strategy<Value = Vec<TerminalStatus>> {
    proptest::collection::vec(arb_status(), 1..8)
}

// ============================================================================
// Helpers
// ============================================================================

/// Drive the machine the way the executor does, with every request
/// succeeding and each segment ending with the next scripted outcome.
/// Returns the terminal state, requested segment count and all effects.
fn drive(max_segments: u32, outcomes: &[TerminalStatus]) -> (TurnState, u32, Vec<Effect>) {
    let ctx = TurnContext::new(max_segments);
    let mut state = TurnState::Init;
    let mut effects = Vec::new();
    let mut requests = 0;
    let mut outcomes = outcomes.iter().cloned();
    let mut pending = vec![TurnEvent::Start];

    while let Some(event) = pending.pop() {
        let result = transition(&state, &ctx, event).expect("executor sequence is valid");
        state = result.new_state;
        for effect in &result.effects {
            if let Effect::RequestSegment { .. } = effect {
                requests += 1;
                pending.push(TurnEvent::SegmentOpened);
            }
        }
        effects.extend(result.effects);

        match &state {
            TurnState::Streaming { .. } => {
                // Out of script: treat as a completed final segment
                let status = outcomes
                    .next()
                    .unwrap_or_else(|| TerminalStatus::Completed(String::new()));
                pending.push(TurnEvent::SegmentFinished(status));
            }
            TurnState::Deciding { .. } => pending.push(TurnEvent::Evaluate),
            _ => {}
        }
    }
    (state, requests, effects)
}

fn terminal_effect_count(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::CloseRelay | Effect::FailRelay { .. }))
        .count()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Any event sequence leaves the machine in a well-formed state, and once
    // terminal it stays terminal.
    #[test]
    fn prop_terminal_is_absorbing(events in proptest::collection::vec(arb_event(), 0..30)) {
        let ctx = TurnContext::new(3);
        let mut state = TurnState::Init;

        for event in events {
            let was_terminal = state.is_terminal();
            match transition(&state, &ctx, event) {
                Ok(result) => {
                    prop_assert!(!was_terminal, "terminal state accepted an event");
                    state = result.new_state;
                    if let Some(segment) = state.segment() {
                        prop_assert!(segment >= 1 && segment <= ctx.max_segments);
                    }
                }
                Err(_) => { /* Invalid transition is OK */ }
            }
        }
    }

    // The turn never requests more segments than the budget allows
    #[test]
    fn prop_requests_within_budget(max in 1u32..6, outcomes in arb_outcomes()) {
        let (state, requests, _) = drive(max, &outcomes);
        prop_assert!(state.is_terminal());
        prop_assert!(requests <= max, "{} requests for budget {}", requests, max);
    }

    // Exactly one relay-terminating effect per turn
    #[test]
    fn prop_relay_closed_exactly_once(max in 1u32..6, outcomes in arb_outcomes()) {
        let (_, _, effects) = drive(max, &outcomes);
        prop_assert_eq!(terminal_effect_count(&effects), 1);
        let last_close = effects
            .iter()
            .rposition(|e| matches!(e, Effect::CloseRelay | Effect::FailRelay { .. }));
        prop_assert_eq!(last_close, Some(effects.len() - 1));
    }

    // Done only ever follows a completed segment; truncation past the
    // budget is always a reported failure
    #[test]
    fn prop_outcome_matches_script(max in 1u32..6, outcomes in arb_outcomes()) {
        let (state, requests, _) = drive(max, &outcomes);
        let last = outcomes
            .get(requests as usize - 1)
            .cloned()
            .unwrap_or_else(|| TerminalStatus::Completed(String::new()));

        match (&state, last) {
            (TurnState::Done { segments }, TerminalStatus::Completed(_)) => {
                prop_assert_eq!(*segments, requests);
            }
            (TurnState::Failed { error: TurnError::Segment(_) }, TerminalStatus::Error(_)) => {}
            (TurnState::Failed { error: TurnError::SegmentLimit { max: m } }, TerminalStatus::Truncated(_)) => {
                prop_assert_eq!(*m, max);
                prop_assert_eq!(requests, max);
            }
            (state, last) => prop_assert!(false, "unexpected end {:?} after {:?}", state, last),
        }
    }

    // Continuations append one assistant partial per truncated segment
    #[test]
    fn prop_continuation_carries_partial(max in 2u32..6, partials in proptest::collection::vec("[a-z]{1,8}", 1..4)) {
        let mut outcomes: Vec<_> = partials.iter().cloned().map(TerminalStatus::Truncated).collect();
        outcomes.push(TerminalStatus::Completed("end".to_string()));
        let (_, _, effects) = drive(max, &outcomes);

        let appended: Vec<String> = effects
            .iter()
            .filter_map(|e| match e {
                Effect::AppendContinuation { partial } => Some(partial.clone()),
                _ => None,
            })
            .collect();
        let expected = partials.len().min(max as usize - 1);
        prop_assert_eq!(&appended[..], &partials[..expected]);
    }
}
