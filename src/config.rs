//! Runtime configuration
//!
//! Everything is read from the environment once at startup. The
//! `from_lookup` constructors take the variable source as a closure so tests
//! don't have to touch the process environment.

use std::str::FromStr;
use thiserror::Error;

/// Default continuation directive appended after a truncated segment
pub const CONTINUE_PROMPT: &str = "Continue your prior response. IMPORTANT: Immediately begin from where you left off without any interruptions.\nDo not repeat any content, including artifact and action tags.";

const DEFAULT_MAX_SEGMENTS: u32 = 2;
const DEFAULT_MAX_TOKENS: u32 = 8000;
const DEFAULT_RELAY_BUFFER: usize = 16;
const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings for the continuation controller and relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Maximum number of segments a single turn may use (>= 1)
    pub max_segments: u32,
    /// Directive sent as a user message to request more output
    pub continue_prompt: String,
    /// Output-token budget forwarded to the provider per segment
    pub max_tokens: u32,
    /// Chunks the relay may hold for a slow consumer
    pub relay_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_segments: DEFAULT_MAX_SEGMENTS,
            continue_prompt: CONTINUE_PROMPT.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            relay_buffer: DEFAULT_RELAY_BUFFER,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let max_segments = parse_var(&lookup, "MAX_RESPONSE_SEGMENTS", DEFAULT_MAX_SEGMENTS)?;
        if max_segments == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_RESPONSE_SEGMENTS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let relay_buffer = parse_var(&lookup, "RELAY_BUFFER", DEFAULT_RELAY_BUFFER)?;
        if relay_buffer == 0 {
            return Err(ConfigError::Invalid {
                var: "RELAY_BUFFER",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            max_segments,
            continue_prompt: lookup("CONTINUE_PROMPT")
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| CONTINUE_PROMPT.to_string()),
            max_tokens: parse_var(&lookup, "MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
            relay_buffer,
        })
    }
}

/// Configuration for LLM providers
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
    /// Ollama server, e.g. `http://localhost:11434`
    pub ollama_base_url: Option<String>,
    /// Default model ID
    pub default_model: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            anthropic_api_key: lookup("ANTHROPIC_API_KEY"),
            google_api_key: lookup("GOOGLE_GENERATIVE_AI_API_KEY"),
            ollama_base_url: lookup("OLLAMA_BASE_URL"),
            default_model: lookup("DEFAULT_MODEL"),
        }
    }
}

/// Server listen port (`CHAT_RELAY_PORT`)
pub fn port_from_env() -> Result<u16, ConfigError> {
    parse_var(&|name: &str| std::env::var(name).ok(), "CHAT_RELAY_PORT", DEFAULT_PORT)
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
