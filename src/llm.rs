//! LLM provider abstraction
//!
//! Provides a common streaming interface over the model providers. A call
//! to [`LlmService::stream`] resolves once the provider has accepted the
//! request and yields a [`Segment`]: the byte stream of generated text plus
//! its eventual [`TerminalStatus`].

mod anthropic;
mod error;
mod gemini;
mod models;
mod ollama;
mod registry;
mod segment;
pub mod stream;
mod types;

pub use anthropic::AnthropicService;
pub use error::{LlmError, LlmErrorKind};
pub use gemini::GeminiService;
pub use models::{all_models, find_model, ModelDef, ModelSelection, Provider, ProviderSelection};
pub use ollama::OllamaService;
pub use registry::ModelRegistry;
pub use segment::{Segment, SegmentBody, SegmentStatus, SegmentWriter, TerminalStatus};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Chunks a provider may buffer ahead of the relay
pub const SEGMENT_BUFFER: usize = 8;

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Start a generation. Errors here mean no byte was produced.
    async fn stream(&self, request: &GenerationRequest) -> Result<Segment, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;

    /// Vendor serving this model
    fn provider(&self) -> Provider;
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn stream(&self, request: &GenerationRequest) -> Result<Segment, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.stream(request).await;

        match result {
            Ok(segment) => {
                tracing::info!(
                    model = %self.model_id,
                    ttfb_ms = %start.elapsed().as_millis(),
                    messages = request.messages.len(),
                    "LLM stream opened"
                );
                Ok(observe(segment, self.model_id.clone(), start))
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %start.elapsed().as_millis(),
                    error = %e.message,
                    kind = e.kind.as_str(),
                    "LLM request failed"
                );
                Err(e)
            }
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn provider(&self) -> Provider {
        self.inner.provider()
    }
}

/// Re-route a segment's status through a task that logs it.
fn observe(segment: Segment, model_id: String, start: std::time::Instant) -> Segment {
    let (body, status) = segment.into_parts();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let status = status.wait().await;
        match &status {
            TerminalStatus::Error(e) => tracing::warn!(
                model = %model_id,
                duration_ms = %start.elapsed().as_millis(),
                error = %e,
                "LLM stream failed"
            ),
            other => tracing::info!(
                model = %model_id,
                duration_ms = %start.elapsed().as_millis(),
                status = other.tag(),
                "LLM stream finished"
            ),
        }
        let _ = tx.send(status);
    });
    Segment::new(body, rx)
}
