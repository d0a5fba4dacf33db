//! Google Gemini provider implementation

use super::stream::{pump, PartDecoder, SseDecoder, SseEvent};
use super::types::{FinishReason, GenerationRequest, MessageRole, StreamPart};
use super::{LlmError, LlmService, Provider, Segment, SEGMENT_BUFFER};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini service implementation
pub struct GeminiService {
    client: Client,
    api_key: String,
    url: String,
    model_id: String,
}

impl GeminiService {
    pub fn new(api_key: String, model_id: &str) -> Result<Self, LlmError> {
        Self::with_base_url(api_key, model_id, API_BASE)
    }

    pub fn with_base_url(api_key: String, model_id: &str, base_url: &str) -> Result<Self, LlmError> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            base_url.trim_end_matches('/'),
            model_id
        );

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            url,
            model_id: model_id.to_string(),
        })
    }

    fn translate_request(request: &GenerationRequest) -> GeminiRequest {
        let mut system = request.system.clone();
        let mut contents: Vec<GeminiContent> = Vec::new();

        for msg in &request.messages {
            let role = match msg.role {
                MessageRole::System => {
                    if !system.is_empty() {
                        system.push_str("\n\n");
                    }
                    system.push_str(&msg.content);
                    continue;
                }
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            };
            contents.push(GeminiContent {
                role: Some(role.to_string()),
                parts: vec![GeminiPart {
                    text: Some(msg.content.clone()),
                }],
            });
        }

        GeminiRequest {
            contents,
            system_instruction: if system.is_empty() {
                None
            } else {
                Some(GeminiContent {
                    role: None,
                    parts: vec![GeminiPart { text: Some(system) }],
                })
            },
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens,
            },
        }
    }
}

#[async_trait]
impl LlmService for GeminiService {
    async fn stream(&self, request: &GenerationRequest) -> Result<Segment, LlmError> {
        let gemini_request = Self::translate_request(request);

        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&gemini_request)
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
            GeminiDecoder::default(),
            writer,
        ));
        Ok(segment)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn provider(&self) -> Provider {
        Provider::Google
    }
}

/// Decodes `streamGenerateContent?alt=sse` output.
///
/// Gemini has no explicit end event: the finish reason rides on the last
/// chunk and the connection closes.
#[derive(Debug, Default)]
pub(crate) struct GeminiDecoder {
    sse: SseDecoder,
    finish: Option<FinishReason>,
}

impl GeminiDecoder {
    fn decode(&mut self, event: &SseEvent, parts: &mut Vec<StreamPart>) -> Result<(), LlmError> {
        let chunk: GeminiChunk = serde_json::from_str(&event.data).map_err(|e| {
            LlmError::unknown(format!("Failed to parse Gemini chunk: {e} - data: {}", event.data))
        })?;

        if let Some(error) = chunk.error {
            return Err(match error.code {
                Some(429) => LlmError::rate_limit(error.message),
                Some(500..=599) => LlmError::server_error(error.message),
                _ => LlmError::unknown(error.message),
            });
        }

        for candidate in chunk.candidates {
            if let Some(content) = candidate.content {
                for part in content.parts {
                    if let Some(text) = part.text {
                        parts.push(StreamPart::Delta(text));
                    }
                }
            }
            if let Some(reason) = candidate.finish_reason {
                self.finish = Some(map_finish_reason(&reason));
            }
        }
        Ok(())
    }
}

impl PartDecoder for GeminiDecoder {
    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<StreamPart>, LlmError> {
        let mut parts = Vec::new();
        for event in self.sse.push(chunk) {
            self.decode(&event, &mut parts)?;
        }
        Ok(parts)
    }

    fn end(&mut self) -> Result<Vec<StreamPart>, LlmError> {
        let mut parts = Vec::new();
        if let Some(event) = self.sse.finish() {
            self.decode(&event, &mut parts)?;
        }
        match self.finish.take() {
            Some(reason) => parts.push(StreamPart::Finish(reason)),
            None => {
                return Err(LlmError::network(
                    "Gemini stream ended without a finish reason",
                ))
            }
        }
        Ok(parts)
    }
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "MAX_TOKENS" => FinishReason::Length,
        "STOP" => FinishReason::Stop,
        other => FinishReason::Other(other.to_string()),
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    code: Option<u16>,
    message: String,
}
