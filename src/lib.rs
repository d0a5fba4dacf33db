//! Chat relay
//!
//! Streams a model's reply to an HTTP client as one continuous body, even
//! when the model stops at its output-token limit and the reply has to be
//! generated in several segments.

pub mod api;
pub mod config;
pub mod continuation;
pub mod llm;
pub mod relay;
pub mod system_prompt;

#[cfg(test)]
mod testing;
