//! Entry point for running turns

use super::{TurnController, TurnError, TurnReport};
use crate::config::RelayConfig;
use crate::llm::{ChatMessage, ModelRegistry, ProviderSelection};
use crate::relay::{RelayChannel, RelayStream};
use crate::system_prompt::system_prompt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// A running turn: the consumer stream plus the controller's final report
#[derive(Debug)]
pub struct Turn {
    pub stream: RelayStream,
    pub report: JoinHandle<TurnReport>,
}

impl Turn {
    pub fn into_parts(self) -> (RelayStream, JoinHandle<TurnReport>) {
        (self.stream, self.report)
    }
}

#[derive(Clone)]
pub struct TurnRunner {
    registry: Arc<ModelRegistry>,
    config: Arc<RelayConfig>,
}

impl TurnRunner {
    pub fn new(registry: Arc<ModelRegistry>, config: Arc<RelayConfig>) -> Self {
        Self { registry, config }
    }

    /// Start a turn over `log` and return its stream as soon as the first
    /// segment is attached.
    ///
    /// Fails only if the response could not begin at all; later failures
    /// terminate the stream with an error item.
    pub async fn run_turn(
        &self,
        log: Vec<ChatMessage>,
        selection: Option<&ProviderSelection>,
    ) -> Result<Turn, TurnError> {
        let llm = self.registry.resolve(selection).map_err(|e| {
            tracing::error!(error = %e, "No model available for turn");
            TurnError::Setup(e)
        })?;

        let turn_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("turn", turn_id = %turn_id, model = %llm.model_id());

        let (relay, stream) = span.in_scope(|| RelayChannel::new(self.config.relay_buffer));
        let mut controller = TurnController::new(
            turn_id,
            log,
            system_prompt(),
            llm,
            relay,
            self.config.clone(),
        );

        controller.start().instrument(span.clone()).await?;
        let report = tokio::spawn(controller.run().instrument(span));

        Ok(Turn { stream, report })
    }
}
