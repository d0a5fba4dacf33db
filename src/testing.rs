//! Mock implementations for testing
//!
//! These mocks drive the controller and the HTTP layer without real I/O.

use crate::llm::{
    FinishReason, GenerationRequest, LlmError, LlmService, Provider, Segment, SEGMENT_BUFFER,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// How a scripted segment ends after its chunks
#[derive(Debug, Clone)]
pub enum ScriptedEnd {
    Finish(FinishReason),
    Fail(LlmError),
    /// Never reports a status; waits for the reader to go away
    Hang,
}

/// One scripted segment: chunks to emit, then an ending
#[derive(Debug, Clone)]
pub struct ScriptedSegment {
    pub chunks: Vec<String>,
    pub end: ScriptedEnd,
}

impl ScriptedSegment {
    fn new(chunks: &[&str], end: ScriptedEnd) -> Self {
        Self {
            chunks: chunks.iter().map(|c| (*c).to_string()).collect(),
            end,
        }
    }

    pub fn completed(chunks: &[&str]) -> Self {
        Self::new(chunks, ScriptedEnd::Finish(FinishReason::Stop))
    }

    pub fn truncated(chunks: &[&str]) -> Self {
        Self::new(chunks, ScriptedEnd::Finish(FinishReason::Length))
    }

    pub fn failed(chunks: &[&str], error: LlmError) -> Self {
        Self::new(chunks, ScriptedEnd::Fail(error))
    }

    pub fn hanging(chunks: &[&str]) -> Self {
        Self::new(chunks, ScriptedEnd::Hang)
    }
}

/// Mock model that plays back queued segments
pub struct MockLlmService {
    model_id: String,
    provider: Provider,
    script: Mutex<VecDeque<Result<ScriptedSegment, LlmError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl MockLlmService {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            provider: Provider::Google,
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    pub fn queue_segment(&self, segment: ScriptedSegment) {
        self.script.lock().unwrap().push_back(Ok(segment));
    }

    /// The next request fails before streaming
    pub fn queue_error(&self, error: LlmError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn stream(&self, request: &GenerationRequest) -> Result<Segment, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        let scripted = next.unwrap_or_else(|| Err(LlmError::unknown("No more mock segments")))?;

        let (mut writer, segment) = Segment::channel(SEGMENT_BUFFER);
        tokio::spawn(async move {
            for chunk in &scripted.chunks {
                if !writer.push_text(chunk).await {
                    return;
                }
            }
            match scripted.end {
                ScriptedEnd::Finish(reason) => writer.finish(&reason),
                ScriptedEnd::Fail(error) => writer.fail(error).await,
                ScriptedEnd::Hang => writer.closed().await,
            }
        });
        Ok(segment)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn provider(&self) -> Provider {
        self.provider
    }
}
