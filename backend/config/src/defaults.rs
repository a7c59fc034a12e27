//! Config defaults: applies sensible default values to parsed config.

use crate::schema::{LoggingConfig, PilotConfig, SessionsConfig};

/// Default iteration budget per run.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Default pause between iterations (ms).
pub const DEFAULT_ITERATION_DELAY_MS: u64 = 1_000;

/// Default session retention: 7 days (ms).
pub const DEFAULT_SESSION_RETENTION_MS: u64 = 7 * 24 * 60 * 60 * 1_000;

/// Default number of sessions returned by history listings.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Default number of recent results summarised in planner prompts.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Default browser viewport.
pub const DEFAULT_VIEWPORT: (u32, u32) = (1280, 800);

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: PilotConfig) -> PilotConfig {
    let config = apply_settings_defaults(config);
    let config = apply_model_defaults(config);
    let config = apply_operator_defaults(config);
    let config = apply_session_defaults(config);
    apply_logging_defaults(config)
}

fn apply_settings_defaults(mut config: PilotConfig) -> PilotConfig {
    let settings = &mut config.settings;
    settings.max_iterations.get_or_insert(DEFAULT_MAX_ITERATIONS);
    settings.iteration_delay.get_or_insert(DEFAULT_ITERATION_DELAY_MS);
    settings
        .session_retention
        .get_or_insert(DEFAULT_SESSION_RETENTION_MS);
    settings.history_limit.get_or_insert(DEFAULT_HISTORY_LIMIT);
    config
}

fn apply_model_defaults(mut config: PilotConfig) -> PilotConfig {
    config
        .model
        .parameters
        .history_window
        .get_or_insert(DEFAULT_HISTORY_WINDOW);
    config
}

/// Viewport defaults only matter for surfaces that render pages.
fn apply_operator_defaults(mut config: PilotConfig) -> PilotConfig {
    if config.operator.kind.eq_ignore_ascii_case("desktop") {
        return config;
    }
    let settings = &mut config.operator.settings;
    settings.viewport_width.get_or_insert(DEFAULT_VIEWPORT.0);
    settings.viewport_height.get_or_insert(DEFAULT_VIEWPORT.1);
    config
}

fn apply_session_defaults(mut config: PilotConfig) -> PilotConfig {
    let sessions = config.sessions.get_or_insert_with(SessionsConfig::default);
    if sessions.store.is_none() {
        sessions.store = Some("memory".to_string());
    }
    config
}

fn apply_logging_defaults(mut config: PilotConfig) -> PilotConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some("info".to_string());
    }
    logging.json.get_or_insert(false);
    config
}
