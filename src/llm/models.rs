//! Centralized model definitions for all LLM providers
//!
//! This module contains all model definitions in a single location,
//! making it easier to add new models and providers.

use super::{AnthropicService, GeminiService, LlmError, LlmService, OllamaService};
use crate::config::LlmConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// LLM provider enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    Google,
    Ollama,
}

impl Provider {
    /// Tag used by clients in a provider selection
    pub fn tag(self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
            Provider::Ollama => "ollama",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "anthropic" => Some(Provider::Anthropic),
            "google" => Some(Provider::Google),
            "ollama" => Some(Provider::Ollama),
            _ => None,
        }
    }
}

/// Client-supplied choice of vendor and model.
///
/// The vendor is kept as a free string so that an unknown vendor falls back
/// to the default model instead of rejecting the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSelection {
    #[serde(rename = "type")]
    pub vendor: String,
    pub model: ModelSelection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelection {
    pub id: String,
    #[serde(
        default,
        rename = "displayName",
        skip_serializing_if = "Option::is_none"
    )]
    pub display_name: Option<String>,
}

impl ProviderSelection {
    pub fn new(provider: Provider, model_id: impl Into<String>) -> Self {
        Self {
            vendor: provider.tag().to_string(),
            model: ModelSelection {
                id: model_id.into(),
                display_name: None,
            },
        }
    }

    pub fn provider(&self) -> Option<Provider> {
        Provider::from_tag(&self.vendor)
    }
}

/// Model definition with metadata
#[derive(Debug, Clone)]
pub struct ModelDef {
    /// Model ID as sent to the provider (e.g., "claude-3-5-sonnet-20241022")
    pub id: &'static str,
    /// Provider for this model
    pub provider: Provider,
    /// Human-readable name
    pub display_name: &'static str,
}

impl ModelDef {
    /// Build the service if the provider is configured.
    pub fn create(&self, config: &LlmConfig) -> Option<Result<Arc<dyn LlmService>, LlmError>> {
        match self.provider {
            Provider::Anthropic => {
                let key = non_empty(config.anthropic_api_key.as_deref())?;
                Some(
                    AnthropicService::new(key.to_string(), self.id)
                        .map(|s| Arc::new(s) as Arc<dyn LlmService>),
                )
            }
            Provider::Google => {
                let key = non_empty(config.google_api_key.as_deref())?;
                Some(
                    GeminiService::new(key.to_string(), self.id)
                        .map(|s| Arc::new(s) as Arc<dyn LlmService>),
                )
            }
            Provider::Ollama => {
                let base_url = non_empty(config.ollama_base_url.as_deref())?;
                Some(
                    OllamaService::new(base_url, self.id)
                        .map(|s| Arc::new(s) as Arc<dyn LlmService>),
                )
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Get all available model definitions
pub fn all_models() -> &'static [ModelDef] {
    &[
        // Anthropic models
        ModelDef {
            id: "claude-3-opus-20240229",
            provider: Provider::Anthropic,
            display_name: "Claude Opus Latest",
        },
        ModelDef {
            id: "claude-3-5-sonnet-20241022",
            provider: Provider::Anthropic,
            display_name: "Claude Sonnet 3.5",
        },
        ModelDef {
            id: "claude-3-5-haiku-20241022",
            provider: Provider::Anthropic,
            display_name: "Claude Haiku Latest",
        },
        // Google models
        ModelDef {
            id: "gemini-2.0-flash-exp",
            provider: Provider::Google,
            display_name: "Gemini 2.0 Flash",
        },
        ModelDef {
            id: "gemini-2.0-flash-thinking-exp-1219",
            provider: Provider::Google,
            display_name: "Gemini 2.0 Flash Thinking",
        },
        ModelDef {
            id: "gemini-2.5-flash-preview-04-17",
            provider: Provider::Google,
            display_name: "Gemini 2.5 Preview",
        },
        // Local models served by Ollama
        ModelDef {
            id: "gpt-oss:120b",
            provider: Provider::Ollama,
            display_name: "GPT-OSS 120B",
        },
        ModelDef {
            id: "gpt-oss:latest",
            provider: Provider::Ollama,
            display_name: "GPT-OSS Latest",
        },
        ModelDef {
            id: "qwen3-coder:latest",
            provider: Provider::Ollama,
            display_name: "Qwen3 Coder",
        },
        ModelDef {
            id: "granite3.2-vision:latest",
            provider: Provider::Ollama,
            display_name: "Granite 3.2 Vision",
        },
        ModelDef {
            id: "qwen3-vl:4b",
            provider: Provider::Ollama,
            display_name: "Qwen3 VL 4B",
        },
        ModelDef {
            id: "qwen3-vl:latest",
            provider: Provider::Ollama,
            display_name: "Qwen3 VL Latest",
        },
    ]
}

/// Look up a model definition by id
pub fn find_model(id: &str) -> Option<&'static ModelDef> {
    all_models().iter().find(|m| m.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_ids_unique() {
        let mut ids: Vec<_> = all_models().iter().map(|m| m.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), all_models().len());
    }

    #[test]
    fn test_selection_wire_format() {
        let selection: ProviderSelection = serde_json::from_str(
            r#"{"type":"anthropic","model":{"id":"claude-3-5-haiku-20241022","displayName":"Claude Haiku Latest"}}"#,
        )
        .unwrap();
        assert_eq!(selection.provider(), Some(Provider::Anthropic));
        assert_eq!(selection.model.id, "claude-3-5-haiku-20241022");
    }

    #[test]
    fn test_unknown_vendor_parses() {
        let selection: ProviderSelection =
            serde_json::from_str(r#"{"type":"mistral","model":{"id":"large"}}"#).unwrap();
        assert_eq!(selection.provider(), None);
    }

    #[test]
    fn test_unconfigured_provider_not_created() {
        let def = find_model("gemini-2.0-flash-exp").unwrap();
        assert!(def.create(&LlmConfig::default()).is_none());

        let config = LlmConfig {
            google_api_key: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(def.create(&config).is_none());
    }
}
