//! Anthropic Claude provider implementation (streaming Messages API)

use super::stream::{pump, PartDecoder, SseDecoder, SseEvent};
use super::types::{ChatMessage, FinishReason, GenerationRequest, MessageRole, StreamPart};
use super::{LlmError, LlmService, Provider, Segment, SEGMENT_BUFFER};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic service implementation
pub struct AnthropicService {
    client: Client,
    api_key: String,
    base_url: String,
    model_id: String,
}

impl AnthropicService {
    pub fn new(api_key: String, model_id: &str) -> Result<Self, LlmError> {
        Self::with_base_url(api_key, model_id, API_URL)
    }

    pub fn with_base_url(api_key: String, model_id: &str, base_url: &str) -> Result<Self, LlmError> {
        // No overall timeout: a long generation is a single streaming response.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.to_string(),
            model_id: model_id.to_string(),
        })
    }

    fn translate_request(&self, request: &GenerationRequest) -> AnthropicRequest {
        // Anthropic takes system text out of band; fold any system messages into it.
        let mut system = request.system.clone();
        let mut messages = Vec::with_capacity(request.messages.len());
        for msg in &request.messages {
            match msg.role {
                MessageRole::System => {
                    if !system.is_empty() {
                        system.push_str("\n\n");
                    }
                    system.push_str(&msg.content);
                }
                MessageRole::User | MessageRole::Assistant => {
                    messages.push(translate_message(msg));
                }
            }
        }

        AnthropicRequest {
            model: self.model_id.clone(),
            max_tokens: request.max_tokens,
            system: if system.is_empty() { None } else { Some(system) },
            messages,
            stream: true,
        }
    }
}

fn translate_message(msg: &ChatMessage) -> AnthropicMessage {
    AnthropicMessage {
        role: msg.role.as_str().to_string(),
        content: msg.content.clone(),
    }
}

#[async_trait]
impl LlmService for AnthropicService {
    async fn stream(&self, request: &GenerationRequest) -> Result<Segment, LlmError> {
        let anthropic_request = self.translate_request(request);

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&anthropic_request)
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
            AnthropicDecoder::default(),
            writer,
        ));
        Ok(segment)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn provider(&self) -> Provider {
        Provider::Anthropic
    }
}

/// Decodes the Anthropic event stream
#[derive(Debug, Default)]
pub(crate) struct AnthropicDecoder {
    sse: SseDecoder,
    stop_reason: Option<String>,
    stopped: bool,
}

impl AnthropicDecoder {
    fn decode(&mut self, event: &SseEvent) -> Result<Option<StreamPart>, LlmError> {
        let kind = event.event.as_deref().unwrap_or_default();
        match kind {
            "content_block_delta" => {
                let parsed: ContentBlockDelta = parse(&event.data)?;
                match parsed.delta {
                    Delta::TextDelta { text } => Ok(Some(StreamPart::Delta(text))),
                    Delta::Other => Ok(None),
                }
            }
            "message_delta" => {
                let parsed: MessageDelta = parse(&event.data)?;
                if parsed.delta.stop_reason.is_some() {
                    self.stop_reason = parsed.delta.stop_reason;
                }
                Ok(None)
            }
            "message_stop" => {
                self.stopped = true;
                Ok(Some(StreamPart::Finish(map_stop_reason(
                    self.stop_reason.as_deref(),
                ))))
            }
            "error" => {
                let parsed: ErrorEvent = parse(&event.data)?;
                let message = format!("{}: {}", parsed.error.r#type, parsed.error.message);
                Err(match parsed.error.r#type.as_str() {
                    "overloaded_error" | "api_error" => LlmError::server_error(message),
                    "rate_limit_error" => LlmError::rate_limit(message),
                    _ => LlmError::unknown(message),
                })
            }
            // message_start, content_block_start/stop, ping
            _ => Ok(None),
        }
    }
}

impl PartDecoder for AnthropicDecoder {
    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<StreamPart>, LlmError> {
        let mut parts = Vec::new();
        for event in self.sse.push(chunk) {
            if let Some(part) = self.decode(&event)? {
                parts.push(part);
            }
        }
        Ok(parts)
    }

    fn end(&mut self) -> Result<Vec<StreamPart>, LlmError> {
        let mut parts = Vec::new();
        if let Some(event) = self.sse.finish() {
            if let Some(part) = self.decode(&event)? {
                parts.push(part);
            }
        }
        if !self.stopped {
            return Err(LlmError::network(
                "Anthropic stream ended before message_stop",
            ));
        }
        Ok(parts)
    }
}

fn map_stop_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("max_tokens") => FinishReason::Length,
        None | Some("end_turn" | "stop_sequence") => FinishReason::Stop,
        Some(other) => FinishReason::Other(other.to_string()),
    }
}

fn parse<'a, T: Deserialize<'a>>(data: &'a str) -> Result<T, LlmError> {
    serde_json::from_str(data)
        .map_err(|e| LlmError::unknown(format!("Failed to parse Anthropic event: {e} - data: {data}")))
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ContentBlockDelta {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    delta: MessageDeltaBody,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEvent {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    r#type: String,
    message: String,
}
