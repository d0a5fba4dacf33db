//! HTTP API
//!
//! Thin transport boundary: decodes a chat request, starts a turn and
//! returns the relay stream as the response body.

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::config::RelayConfig;
use crate::continuation::TurnRunner;
use crate::llm::ModelRegistry;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runner: TurnRunner,
    pub llm_registry: Arc<ModelRegistry>,
}

impl AppState {
    pub fn new(llm_registry: Arc<ModelRegistry>, config: RelayConfig) -> Self {
        Self {
            runner: TurnRunner::new(llm_registry.clone(), Arc::new(config)),
            llm_registry,
        }
    }
}
