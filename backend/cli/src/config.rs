//! Config resolution for the CLI: file, then command-line overrides, then
//! substitution, defaults and validation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

use clawpilot_config::{apply_merge_patch, config_dir, config_file_path, load_config, prepare, PilotConfig};

/// Flags that patch the loaded config for a single invocation.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub max_iterations: Option<u32>,
    pub delay_ms: Option<u64>,
    pub operator: Option<String>,
    pub simulated: bool,
}

impl RunOverrides {
    /// The overrides as a JSON merge patch over the camelCase config layout.
    pub fn to_patch(&self) -> Value {
        let mut settings = Map::new();
        if let Some(max) = self.max_iterations {
            settings.insert("maxIterations".into(), json!(max));
        }
        if let Some(delay) = self.delay_ms {
            settings.insert("iterationDelay".into(), json!(delay));
        }

        let mut operator = Map::new();
        if let Some(kind) = &self.operator {
            operator.insert("type".into(), json!(kind));
        }
        if self.simulated {
            operator.insert("settings".into(), json!({ "simulated": true }));
        }

        let mut patch = Map::new();
        if !settings.is_empty() {
            patch.insert("settings".into(), Value::Object(settings));
        }
        if !operator.is_empty() {
            patch.insert("operator".into(), Value::Object(operator));
        }
        Value::Object(patch)
    }
}

pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => config_file_path(&config_dir()),
    }
}

/// Load the config at `path` (defaults when absent) with `overrides` applied.
pub async fn load(path: &Path, overrides: &RunOverrides) -> Result<PilotConfig> {
    let raw = load_config(path).await?;
    let patched = apply_merge_patch(&raw, &overrides.to_patch())?;
    prepare(patched).with_context(|| format!("Invalid config at {}", path.display()))
}
