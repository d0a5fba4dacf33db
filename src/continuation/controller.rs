//! Turn executor
//!
//! Owns the conversation log for one turn, feeds events through
//! [`transition`] and performs the resulting effects.

use super::{transition, Effect, TurnContext, TurnError, TurnEvent, TurnState};
use crate::config::RelayConfig;
use crate::llm::{ChatMessage, GenerationRequest, LlmService, Segment, SegmentStatus};
use crate::relay::{RelayChannel, RelayError};
use std::collections::VecDeque;
use std::sync::Arc;

/// Final record of a turn
#[derive(Debug)]
pub struct TurnReport {
    pub turn_id: String,
    pub state: TurnState,
    /// Accepted `switch_source` calls
    pub switches: u32,
    /// Conversation log including any continuation messages
    pub log: Vec<ChatMessage>,
}

impl TurnReport {
    pub fn error(&self) -> Option<&TurnError> {
        match &self.state {
            TurnState::Failed { error } => Some(error),
            _ => None,
        }
    }
}

pub struct TurnController {
    turn_id: String,
    state: TurnState,
    context: TurnContext,
    log: Vec<ChatMessage>,
    system_prompt: String,
    llm: Arc<dyn LlmService>,
    relay: RelayChannel,
    config: Arc<RelayConfig>,
    /// Segment returned by the provider, waiting to be handed to the relay
    opened: Option<Segment>,
    /// Terminal status of the segment the relay is draining
    status: Option<SegmentStatus>,
}

impl TurnController {
    pub fn new(
        turn_id: impl Into<String>,
        log: Vec<ChatMessage>,
        system_prompt: impl Into<String>,
        llm: Arc<dyn LlmService>,
        relay: RelayChannel,
        config: Arc<RelayConfig>,
    ) -> Self {
        Self {
            turn_id: turn_id.into(),
            state: TurnState::Init,
            context: TurnContext::new(config.max_segments),
            log,
            system_prompt: system_prompt.into(),
            llm,
            relay,
            config,
            opened: None,
            status: None,
        }
    }

    pub fn state(&self) -> &TurnState {
        &self.state
    }

    /// Request the first segment and attach it to the relay.
    ///
    /// Returns once the response has begun, or with the error that kept it
    /// from starting.
    pub async fn start(&mut self) -> Result<(), TurnError> {
        tracing::info!(
            messages = self.log.len(),
            max_segments = self.context.max_segments,
            "Turn started"
        );
        self.process_event(TurnEvent::Start).await;
        match &self.state {
            TurnState::Failed { error } => {
                tracing::error!(error = %error, "Turn failed to start");
                Err(error.clone())
            }
            _ => Ok(()),
        }
    }

    /// Drive the turn to a terminal state.
    pub async fn run(mut self) -> TurnReport {
        while !self.state.is_terminal() {
            let event = match self.state {
                TurnState::Streaming { .. } => self.await_segment().await,
                _ => TurnEvent::Start,
            };
            self.process_event(event).await;
        }
        self.finish()
    }

    async fn await_segment(&mut self) -> TurnEvent {
        let Some(status) = self.status.take() else {
            return TurnEvent::RelayRejected(RelayError::Aborted(
                "no segment in flight".to_string(),
            ));
        };
        let cancel = self.relay.cancellation();
        tokio::select! {
            biased;
            () = cancel.cancelled() => TurnEvent::Cancelled,
            status = status.wait() => TurnEvent::SegmentFinished(status),
        }
    }

    async fn process_event(&mut self, event: TurnEvent) {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            let result = match transition(&self.state, &self.context, event) {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(state = self.state.name(), error = %e, "Invalid turn transition");
                    if !self.state.is_terminal() {
                        let error = TurnError::Protocol(e.to_string());
                        let _ = self.relay.fail(RelayError::Aborted(error.to_string())).await;
                        self.state = TurnState::Failed { error };
                    }
                    return;
                }
            };

            tracing::debug!(
                from = self.state.name(),
                to = result.new_state.name(),
                effects = result.effects.len(),
                "Turn transition"
            );
            self.state = result.new_state;

            for effect in result.effects {
                if let Some(next) = self.execute_effect(effect).await {
                    queue.push_back(next);
                }
            }

            // Deciding is transient
            if matches!(self.state, TurnState::Deciding { .. }) {
                queue.push_back(TurnEvent::Evaluate);
            }
        }
    }

    async fn execute_effect(&mut self, effect: Effect) -> Option<TurnEvent> {
        match effect {
            Effect::RequestSegment { segment } => Some(self.request_segment(segment).await),
            Effect::Attach => self.install(false).await,
            Effect::SwitchSource => self.install(true).await,
            Effect::AppendContinuation { partial } => {
                self.log.push(ChatMessage::assistant(partial));
                self.log
                    .push(ChatMessage::user(self.config.continue_prompt.clone()));
                let next = self.state.segment().unwrap_or_default();
                tracing::info!(
                    segment = next,
                    switches_left = self.context.max_segments.saturating_sub(next),
                    "Segment truncated, continuing"
                );
                None
            }
            Effect::CloseRelay => {
                self.relay.close().await;
                None
            }
            Effect::FailRelay { error } => {
                match self.relay.fail(error).await {
                    // Relay already ended on its own (producer error, disconnect)
                    Ok(()) | Err(RelayError::AlreadyClosed | RelayError::Cancelled) => {}
                    Err(e) => tracing::warn!(error = %e, "Failed to error-close relay"),
                }
                None
            }
        }
    }

    async fn request_segment(&mut self, segment: u32) -> TurnEvent {
        let request = GenerationRequest {
            system: self.system_prompt.clone(),
            messages: self.log.clone(),
            max_tokens: self.config.max_tokens,
        };
        tracing::debug!(segment, messages = request.messages.len(), "Requesting segment");

        let cancel = self.relay.cancellation();
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return TurnEvent::Cancelled,
            result = self.llm.stream(&request) => result,
        };

        match result {
            Ok(opened) => {
                self.opened = Some(opened);
                TurnEvent::SegmentOpened
            }
            Err(e) => TurnEvent::RequestFailed(e),
        }
    }

    /// Hand the opened segment to the relay.
    async fn install(&mut self, switch: bool) -> Option<TurnEvent> {
        let Some(opened) = self.opened.take() else {
            return Some(TurnEvent::RelayRejected(RelayError::Aborted(
                "no segment opened".to_string(),
            )));
        };
        let (body, status) = opened.into_parts();

        let result = if switch {
            self.relay.switch_source(body).await
        } else {
            self.relay.attach(body).await
        };

        match result {
            Ok(()) => {
                self.status = Some(status);
                None
            }
            Err(RelayError::Cancelled) => Some(TurnEvent::Cancelled),
            Err(e) => Some(TurnEvent::RelayRejected(e)),
        }
    }

    fn finish(self) -> TurnReport {
        let switches = self.relay.switches();
        match &self.state {
            TurnState::Done { segments } => {
                tracing::info!(segments, switches, "Turn completed");
            }
            TurnState::Failed {
                error: TurnError::Cancelled,
            } => {
                tracing::info!(switches, "Turn cancelled by consumer");
            }
            TurnState::Failed { error } => {
                tracing::warn!(kind = error.kind(), error = %error, switches, "Turn failed");
            }
            other => {
                tracing::error!(state = other.name(), "Turn ended in non-terminal state");
            }
        }

        TurnReport {
            turn_id: self.turn_id,
            state: self.state,
            switches,
            log: self.log,
        }
    }
}
