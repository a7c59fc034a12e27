use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use clawpilot_config::ModelConfig;
use clawpilot_core::{PilotError, Planner};

use crate::model::VisionModel;
use crate::planner::ModelPlanner;
use crate::provider::ModelProvider;
use crate::scripted::ScriptedPlanner;

/// Builds a vision model backend from the model section of the config.
pub type ModelBuilder =
    Arc<dyn Fn(&ModelConfig) -> anyhow::Result<Arc<dyn VisionModel>> + Send + Sync>;

/// Selects and constructs a planner from `model.provider`.
///
/// Hosts register one backend per provider. Everything that can go wrong
/// with the provider choice fails here, at construction, never on first use.
pub struct PlannerFactory {
    backends: HashMap<ModelProvider, ModelBuilder>,
}

impl PlannerFactory {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Register the backend used for `provider`, replacing any earlier one.
    pub fn register_model(&mut self, provider: ModelProvider, builder: ModelBuilder) {
        self.backends.insert(provider, builder);
    }

    pub fn with_model(mut self, provider: ModelProvider, builder: ModelBuilder) -> Self {
        self.register_model(provider, builder);
        self
    }

    /// Providers that currently have a backend (scripted is always available).
    pub fn available(&self) -> Vec<ModelProvider> {
        ModelProvider::ALL
            .into_iter()
            .filter(|p| *p == ModelProvider::Scripted || self.backends.contains_key(p))
            .collect()
    }

    pub fn build(&self, config: &ModelConfig) -> Result<Box<dyn Planner>, PilotError> {
        let provider: ModelProvider = config.provider.parse()?;

        if provider == ModelProvider::Scripted {
            let script = config.parameters.script.as_deref().ok_or_else(|| {
                PilotError::Initialization(
                    "scripted provider needs model.parameters.script".to_string(),
                )
            })?;
            let planner = ScriptedPlanner::from_file(Path::new(script))?;
            info!(provider = %provider, script, "Planner ready");
            return Ok(Box::new(planner));
        }

        if provider.requires_api_key()
            && config.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(PilotError::Initialization(format!(
                "provider '{provider}' requires model.apiKey"
            )));
        }

        let builder = self.backends.get(&provider).ok_or_else(|| {
            PilotError::Initialization(format!("no model backend registered for '{provider}'"))
        })?;
        let model = builder(config).map_err(|e| {
            PilotError::Initialization(format!("cannot build '{provider}' backend: {e}"))
        })?;

        info!(provider = %provider, model = %config.name, "Planner ready");
        Ok(Box::new(ModelPlanner::new(model, config)))
    }
}

impl Default for PlannerFactory {
    fn default() -> Self {
        Self::new()
    }
}
