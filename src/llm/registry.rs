//! Model registry for managing available LLM providers

use super::{all_models, find_model, LlmError, LlmService, LoggingService, ProviderSelection};
use crate::api::ModelInfo;
use crate::config::LlmConfig;
use std::collections::HashMap;
use std::sync::Arc;

/// Preferred default when `DEFAULT_MODEL` is not set
const PREFERRED_DEFAULT: &str = "gemini-2.0-flash-thinking-exp-1219";

/// Registry of available LLM models
pub struct ModelRegistry {
    services: HashMap<String, Arc<dyn LlmService>>,
    default_model: String,
}

impl ModelRegistry {
    /// Create an empty registry; services are added with [`ModelRegistry::register`]
    pub fn new_empty(default_model: impl Into<String>) -> Self {
        Self {
            services: HashMap::new(),
            default_model: default_model.into(),
        }
    }

    pub fn new(config: &LlmConfig) -> Self {
        let mut services: HashMap<String, Arc<dyn LlmService>> = HashMap::new();

        for model_def in all_models() {
            match model_def.create(config) {
                Some(Ok(service)) => {
                    services.insert(
                        model_def.id.to_string(),
                        Arc::new(LoggingService::new(service)),
                    );
                }
                Some(Err(e)) => {
                    tracing::warn!(model = model_def.id, error = %e, "Failed to create model service");
                }
                None => {}
            }
        }

        // Determine default model
        let default_model = config
            .default_model
            .clone()
            .filter(|id| services.contains_key(id))
            .or_else(|| {
                if services.contains_key(PREFERRED_DEFAULT) {
                    Some(PREFERRED_DEFAULT.to_string())
                } else {
                    // Fall back to the first available model in catalogue order
                    all_models()
                        .iter()
                        .find(|m| services.contains_key(m.id))
                        .map(|m| m.id.to_string())
                }
            })
            .unwrap_or_else(|| PREFERRED_DEFAULT.to_string());

        Self {
            services,
            default_model,
        }
    }

    /// Register a service under its model id
    pub fn register(&mut self, service: Arc<dyn LlmService>) {
        self.services
            .insert(service.model_id().to_string(), service);
    }

    /// Get a model by ID
    pub fn get(&self, model_id: &str) -> Option<Arc<dyn LlmService>> {
        self.services.get(model_id).cloned()
    }

    /// Get the default model
    pub fn default(&self) -> Option<Arc<dyn LlmService>> {
        self.get(&self.default_model)
    }

    /// Get the default model ID
    pub fn default_model_id(&self) -> &str {
        &self.default_model
    }

    /// Resolve a client selection to a service.
    ///
    /// A selection only matches when both vendor and model id agree with a
    /// registered service. Anything else, including no selection at all,
    /// falls back to the default model.
    pub fn resolve(
        &self,
        selection: Option<&ProviderSelection>,
    ) -> Result<Arc<dyn LlmService>, LlmError> {
        if let Some(selection) = selection {
            let matched = self.get(&selection.model.id).filter(|service| {
                selection.provider() == Some(service.provider())
            });
            if let Some(service) = matched {
                return Ok(service);
            }
            tracing::debug!(
                vendor = %selection.vendor,
                model = %selection.model.id,
                default = %self.default_model,
                "Unknown provider selection, using default model"
            );
        }

        self.default().ok_or_else(|| {
            LlmError::no_model(format!(
                "No model available (default {} is not configured)",
                self.default_model
            ))
        })
    }

    /// List all available model IDs
    pub fn available_models(&self) -> Vec<String> {
        let mut models: Vec<_> = self.services.keys().cloned().collect();
        models.sort();
        models
    }

    /// Get detailed information about available models
    pub fn available_model_info(&self) -> Vec<ModelInfo> {
        let mut infos: Vec<ModelInfo> = self
            .services
            .values()
            .map(|service| {
                let display_name = find_model(service.model_id())
                    .map_or_else(|| service.model_id().to_string(), |d| d.display_name.to_string());
                ModelInfo {
                    id: service.model_id().to_string(),
                    provider: service.provider().tag().to_string(),
                    display_name,
                }
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Check if any models are available
    pub fn has_models(&self) -> bool {
        !self.services.is_empty()
    }
}
