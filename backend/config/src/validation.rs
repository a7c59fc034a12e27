//! Config validation: schema checks with user-friendly error messages.

use crate::schema::PilotConfig;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &PilotConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_model(config, &mut report);
    validate_operator(config, &mut report);
    validate_settings(config, &mut report);
    validate_sessions(config, &mut report);
    report
}

fn validate_model(config: &PilotConfig, report: &mut ValidationReport) {
    let model = &config.model;
    if model.provider.trim().is_empty() {
        report.error("model.provider", "Provider cannot be empty");
    }
    let scripted = model.provider.eq_ignore_ascii_case("scripted");
    if model.name.trim().is_empty() && !scripted {
        report.error("model.name", "Model name cannot be empty");
    }
    if scripted && model.parameters.script.is_none() {
        report.error("model.parameters.script", "Scripted provider needs a script path");
    }
    if let Some(t) = model.parameters.temperature {
        if !(0.0..=2.0).contains(&t) {
            report.error(
                "model.parameters.temperature",
                format!("Temperature {t} must be within [0, 2]"),
            );
        }
    }
    if model.parameters.max_tokens == Some(0) {
        report.error("model.parameters.maxTokens", "maxTokens must be positive");
    }
    if let Some(url) = &model.base_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            report.warn("model.baseUrl", "baseUrl should start with http:// or https://");
        }
    }
}

fn validate_operator(config: &PilotConfig, report: &mut ValidationReport) {
    let kind = config.operator.kind.to_ascii_lowercase();
    if !matches!(kind.as_str(), "desktop" | "browser" | "hybrid") {
        report.error(
            "operator.type",
            format!("Unknown operator type '{}'", config.operator.kind),
        );
    }
    let settings = &config.operator.settings;
    if settings.viewport_width == Some(0) || settings.viewport_height == Some(0) {
        report.error("operator.settings", "Viewport dimensions must be positive");
    }
    if kind == "desktop" && settings.start_url.is_some() {
        report.warn("operator.settings.startUrl", "Desktop operators ignore startUrl");
    }
}

fn validate_settings(config: &PilotConfig, report: &mut ValidationReport) {
    let settings = &config.settings;
    if settings.max_iterations == Some(0) {
        report.error("settings.maxIterations", "maxIterations must be at least 1");
    }
    if settings.max_iterations.is_some_and(|n| n > 200) {
        report.warn(
            "settings.maxIterations",
            "Very high iteration budgets drive many real actions against the target",
        );
    }
    if settings.history_limit == Some(0) {
        report.warn("settings.historyLimit", "historyLimit 0 hides all sessions");
    }
}

fn validate_sessions(config: &PilotConfig, report: &mut ValidationReport) {
    let Some(sessions) = &config.sessions else { return };
    match sessions.store.as_deref() {
        None | Some("memory") => {}
        Some("sqlite") => {
            if sessions.path.as_deref().map_or(true, |p| p.trim().is_empty()) {
                report.error("sessions.path", "sqlite store requires a path");
            }
        }
        Some(other) => report.error("sessions.store", format!("Unknown store '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SessionsConfig;

    fn valid() -> PilotConfig {
        let mut cfg = PilotConfig::default();
        cfg.model.provider = "openai".into();
        cfg.model.name = "gpt-4o".into();
        cfg
    }

    #[test]
    fn minimal_config_is_valid() {
        assert!(validate(&valid()).is_valid());
    }

    #[test]
    fn empty_provider_is_an_error() {
        let report = validate(&PilotConfig::default());
        assert!(report.errors.iter().any(|e| e.path == "model.provider"));
    }

    #[test]
    fn zero_iterations_is_an_error() {
        let mut cfg = valid();
        cfg.settings.max_iterations = Some(0);
        let report = validate(&cfg);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].path, "settings.maxIterations");
    }

    #[test]
    fn unknown_operator_type_is_an_error() {
        let mut cfg = valid();
        cfg.operator.kind = "mainframe".into();
        assert!(!validate(&cfg).is_valid());
    }

    #[test]
    fn sqlite_without_path_is_an_error() {
        let mut cfg = valid();
        cfg.sessions = Some(SessionsConfig {
            store: Some("sqlite".into()),
            path: None,
        });
        let report = validate(&cfg);
        assert!(report.errors.iter().any(|e| e.path == "sessions.path"));
    }

    #[test]
    fn scripted_provider_needs_script_but_no_name() {
        let mut cfg = PilotConfig::default();
        cfg.model.provider = "scripted".into();
        let report = validate(&cfg);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path, "model.parameters.script");

        cfg.model.parameters.script = Some("plan.json".into());
        assert!(validate(&cfg).is_valid());
    }
}
