//! API request and response types

use crate::llm::{ChatMessage, MessageRole, ProviderSelection};
use serde::{Deserialize, Serialize};

/// Request body for `POST /api/chat`
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<IncomingMessage>,
    #[serde(default)]
    pub provider: Option<ProviderSelection>,
}

/// A message as sent by the chat client.
///
/// Clients send either a plain `content` string or a list of `parts`; only
/// text parts are kept.
#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub role: MessageRole,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl IncomingMessage {
    pub fn into_chat_message(self) -> ChatMessage {
        let content = match self.content {
            Some(content) => content,
            None => self
                .parts
                .into_iter()
                .filter_map(|part| match part {
                    MessagePart::Text { text } => Some(text),
                    MessagePart::Other => None,
                })
                .collect(),
        };
        ChatMessage {
            role: self.role,
            content,
        }
    }
}

/// Model information for API responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub provider: String,
    pub display_name: String,
}

/// Response for model list
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub default: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
