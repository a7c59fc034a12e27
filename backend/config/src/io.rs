//! Config file location and loading, plus merge patching for overrides.

use crate::schema::PilotConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolve the ClawPilot config directory.
/// Priority: `CLAWPILOT_CONFIG_DIR` env > `~/.clawpilot/` > `./.clawpilot`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CLAWPILOT_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".clawpilot"),
        None => PathBuf::from(".clawpilot"),
    }
}

/// Resolve the full path to the main config file.
pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Load and parse the config from disk.
///
/// Returns `Ok(Default::default())` if the file doesn't exist (first run).
pub async fn load_config(path: &Path) -> Result<PilotConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(PilotConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: PilotConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Patch config with a JSON Merge Patch (RFC 7396).
///
/// Used to layer command-line overrides on top of the file config.
pub fn apply_merge_patch(config: &PilotConfig, patch: &serde_json::Value) -> Result<PilotConfig> {
    let mut value =
        serde_json::to_value(config).context("Failed to serialize config for merge patch")?;
    json_merge_patch(&mut value, patch);
    let updated: PilotConfig = serde_json::from_value(value)
        .context("Failed to deserialize config after merge patch")?;
    Ok(updated)
}

/// RFC 7396 JSON Merge Patch algorithm.
fn json_merge_patch(target: &mut serde_json::Value, patch: &serde_json::Value) {
    if let serde_json::Value::Object(patch_map) = patch {
        if !target.is_object() {
            *target = serde_json::Value::Object(serde_json::Map::new());
        }
        if let serde_json::Value::Object(target_map) = target {
            for (key, patch_val) in patch_map {
                if patch_val.is_null() {
                    target_map.remove(key);
                } else {
                    let entry = target_map
                        .entry(key.clone())
                        .or_insert(serde_json::Value::Null);
                    json_merge_patch(entry, patch_val);
                }
            }
        }
    } else {
        *target = patch.clone();
    }
}
