//! ClawPilot runtime configuration schema.
//!
//! The YAML layout is `{model, operator, settings, sessions, logging}` with
//! camelCase keys. Unknown keys under `model.parameters` and
//! `operator.settings` are preserved for backend-specific use.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::defaults::{
    DEFAULT_HISTORY_LIMIT, DEFAULT_ITERATION_DELAY_MS, DEFAULT_MAX_ITERATIONS,
    DEFAULT_SESSION_RETENTION_MS,
};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration: everything needed to construct an engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PilotConfig {
    /// Vision model backing the planner
    #[serde(default)]
    pub model: ModelConfig,

    /// Automation surface
    #[serde(default)]
    pub operator: OperatorConfig,

    /// Iteration loop settings
    #[serde(default)]
    pub settings: RunSettings,

    /// Session recorder backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions: Option<SessionsConfig>,

    /// Logging configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// Provider id, e.g. "openai", "anthropic", "scripted"
    #[serde(default)]
    pub provider: String,

    /// Model name as the provider knows it
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default)]
    pub parameters: ModelParameters,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// How many recent action results the prompt summarises
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_window: Option<usize>,

    /// Path to a JSON script of analyses (scripted provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorConfig {
    /// "desktop" | "browser" | "hybrid"
    #[serde(rename = "type", default = "default_operator_type")]
    pub kind: String,

    #[serde(default)]
    pub settings: OperatorSettings,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            kind: default_operator_type(),
            settings: OperatorSettings::default(),
        }
    }
}

fn default_operator_type() -> String {
    "browser".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headless: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport_width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport_height: Option<u32>,

    /// Page opened right after launch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,

    /// Navigation timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation_timeout: Option<u64>,

    /// Drive in-memory surfaces instead of a real browser/desktop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulated: Option<bool>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

// ---------------------------------------------------------------------------
// Run settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    /// Pause between iterations, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration_delay: Option<u64>,

    /// Sessions not updated within this many milliseconds are pruned at shutdown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_retention: Option<u64>,

    /// Default limit for session history listings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<usize>,
}

impl RunSettings {
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS)
    }

    pub fn iteration_delay_ms(&self) -> u64 {
        self.iteration_delay.unwrap_or(DEFAULT_ITERATION_DELAY_MS)
    }

    pub fn session_retention_ms(&self) -> u64 {
        self.session_retention.unwrap_or(DEFAULT_SESSION_RETENTION_MS)
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT)
    }
}

// ---------------------------------------------------------------------------
// Sessions / logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsConfig {
    /// "memory" | "sqlite"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,

    /// SQLite database path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Directory for rolling NDJSON logs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    /// Console output as JSON instead of human-readable text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
}
