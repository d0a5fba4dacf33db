//! Ollama provider implementation (local models, NDJSON chat stream)

use super::stream::{pump, LineBuffer, PartDecoder};
use super::types::{FinishReason, GenerationRequest, StreamPart};
use super::{LlmError, LlmService, Provider, Segment, SEGMENT_BUFFER};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama service implementation
pub struct OllamaService {
    client: Client,
    url: String,
    model_id: String,
}

impl OllamaService {
    pub fn new(base_url: &str, model_id: &str) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: format!("{}/api/chat", base_url.trim_end_matches('/')),
            model_id: model_id.to_string(),
        })
    }

    fn translate_request(&self, request: &GenerationRequest) -> OllamaRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.is_empty() {
            messages.push(OllamaMessage {
                role: "system".to_string(),
                content: request.system.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| OllamaMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        }));

        OllamaRequest {
            model: self.model_id.clone(),
            messages,
            stream: true,
            options: OllamaOptions {
                num_predict: request.max_tokens,
            },
        }
    }
}

#[async_trait]
impl LlmService for OllamaService {
    async fn stream(&self, request: &GenerationRequest) -> Result<Segment, LlmError> {
        let ollama_request = self.translate_request(request);

        let response = self
            .client
            .post(&self.url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status, &body));
        }

        let (writer, segment) = Segment::channel(SEGMENT_BUFFER);
        tokio::spawn(pump(
            Box::pin(response.bytes_stream()),
            OllamaDecoder::default(),
            writer,
        ));
        Ok(segment)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn provider(&self) -> Provider {
        Provider::Ollama
    }
}

#[derive(Debug, Default)]
pub(crate) struct OllamaDecoder {
    lines: LineBuffer,
    done: bool,
}

impl OllamaDecoder {
    fn decode(&mut self, line: &str, parts: &mut Vec<StreamPart>) -> Result<(), LlmError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        let chunk: OllamaChunk = serde_json::from_str(line).map_err(|e| {
            LlmError::unknown(format!("Failed to parse Ollama chunk: {e} - line: {line}"))
        })?;

        if let Some(error) = chunk.error {
            return Err(LlmError::server_error(error));
        }
        if let Some(message) = chunk.message {
            if !message.content.is_empty() {
                parts.push(StreamPart::Delta(message.content));
            }
        }
        if chunk.done {
            self.done = true;
            let reason = match chunk.done_reason.as_deref() {
                Some("length") => FinishReason::Length,
                None | Some("stop") => FinishReason::Stop,
                Some(other) => FinishReason::Other(other.to_string()),
            };
            parts.push(StreamPart::Finish(reason));
        }
        Ok(())
    }
}

impl PartDecoder for OllamaDecoder {
    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<StreamPart>, LlmError> {
        let mut parts = Vec::new();
        for line in self.lines.push(chunk) {
            self.decode(&line, &mut parts)?;
        }
        Ok(parts)
    }

    fn end(&mut self) -> Result<Vec<StreamPart>, LlmError> {
        let mut parts = Vec::new();
        if let Some(line) = self.lines.finish() {
            self.decode(&line, &mut parts)?;
        }
        if !self.done {
            return Err(LlmError::network("Ollama stream ended before done"));
        }
        Ok(parts)
    }
}

// Ollama API types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaChunk {
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    done_reason: Option<String>,
    error: Option<String>,
}
