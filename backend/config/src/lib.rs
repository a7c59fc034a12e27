//! `clawpilot-config` — runtime configuration for the ClawPilot engine.
//!
//! Provides:
//! - Typed config schema (model, operator, run settings, sessions, logging)
//! - YAML loading and merge-patch overrides
//! - `${ENV_VAR}` substitution
//! - Config redaction for safe logging/display
//! - Default value application
//! - Schema validation

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{collect_referenced_vars, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{apply_merge_patch, config_dir, config_file_path, load_config};
pub use redact::{collect_redacted_paths, redact};
pub use schema::{
    LoggingConfig, ModelConfig, ModelParameters, OperatorConfig, OperatorSettings, PilotConfig,
    RunSettings, SessionsConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;

/// Load, apply env substitution, apply defaults, and validate a config file.
///
/// This is the main entry point for loading a config at runtime.
pub async fn load_and_prepare(path: &Path) -> Result<PilotConfig> {
    let raw_config = load_config(path).await?;
    prepare(raw_config)
}

/// Run the substitution/defaults/validation pipeline on an in-memory config.
pub fn prepare(raw_config: PilotConfig) -> Result<PilotConfig> {
    let value: Value =
        serde_json::to_value(&raw_config).context("Failed to serialize config for processing")?;

    let value = resolve_env_vars(&value).context("Failed to resolve env vars in config")?;

    let config: PilotConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;

    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if let Some(first) = report.errors.into_iter().next() {
        bail!(first);
    }

    Ok(config)
}

/// The config as a JSON value with secrets masked.
pub fn redacted(config: &PilotConfig) -> Result<Value> {
    let value = serde_json::to_value(config).context("Failed to serialize config")?;
    Ok(redact(&value))
}
