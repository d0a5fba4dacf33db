//! Common types for LLM interactions

use serde::{Deserialize, Serialize};

/// One generation request handed to a model collaborator
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    /// Output-token budget for this segment
    pub max_tokens: u32,
}

/// Message in the conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// Why a provider stopped generating.
///
/// Only `Length` is treated as a truncation; every other reason ends the turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural stop (end of turn, stop sequence)
    Stop,
    /// Output-token budget reached
    Length,
    /// Anything else the provider reports (safety, tool use, ...)
    Other(String),
}

impl FinishReason {
    pub fn is_truncation(&self) -> bool {
        matches!(self, FinishReason::Length)
    }
}

/// A decoded unit of provider output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPart {
    /// Text delta to forward to the consumer
    Delta(String),
    /// Provider reported its stop reason
    Finish(FinishReason),
}
