//! `clawpilot doctor`: check the config and which backends can be built.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use serde_json::Value;

use clawpilot_config::{collect_referenced_vars, load_config, validate, PilotConfig};
use clawpilot_core::OperatorKind;
use clawpilot_planner::{ModelProvider, PlannerFactory};
use clawpilot_recorder::open_recorder;

use crate::terminal_output::{note_error, note_info, note_success, note_warn};

pub async fn run(path: &Path) -> Result<ExitCode> {
    println!("\nRunning ClawPilot doctor...\n");

    if path.exists() {
        note_success(&format!("Config file: {}", path.display()));
    } else {
        note_warn(&format!("No config file at {}; using defaults", path.display()));
    }

    let config = load_config(path).await?;
    let mut healthy = check_env(&config);

    let report = validate(&config);
    for warning in &report.warnings {
        note_warn(&format!("{}: {}", warning.path, warning.message));
    }
    for error in &report.errors {
        note_error(&format!("{}: {}", error.path, error.message));
    }
    healthy &= report.is_valid();

    healthy &= check_planner(&config);
    healthy &= check_operator(&config);
    healthy &= check_sessions(&config);

    println!();
    if healthy {
        note_success("All checks passed.");
        Ok(ExitCode::SUCCESS)
    } else {
        note_error("Some checks failed; fix the errors above.");
        Ok(ExitCode::FAILURE)
    }
}

fn check_env(config: &PilotConfig) -> bool {
    let value = match serde_json::to_value(config) {
        Ok(value) => value,
        Err(e) => {
            note_error(&format!("Config cannot be serialized: {e}"));
            return false;
        }
    };
    let vars = referenced_vars(&value, |name| std::env::var(name).is_ok_and(|v| !v.is_empty()));
    if vars.is_empty() {
        return true;
    }
    println!("Environment variables referenced by the config:");
    let mut all_set = true;
    for (name, set) in vars {
        if set {
            println!("  {name} is set");
        } else {
            note_error(&format!("{name} is missing"));
            all_set = false;
        }
    }
    all_set
}

/// Every `${VAR}` the config refers to, with whether `is_set` finds it.
fn referenced_vars(value: &Value, is_set: impl Fn(&str) -> bool) -> Vec<(String, bool)> {
    collect_referenced_vars(value)
        .into_iter()
        .map(|name| {
            let set = is_set(&name);
            (name, set)
        })
        .collect()
}

fn check_planner(config: &PilotConfig) -> bool {
    let provider: ModelProvider = match config.model.provider.parse() {
        Ok(provider) => provider,
        Err(e) => {
            note_error(&e.to_string());
            return false;
        }
    };
    if PlannerFactory::new().available().contains(&provider) {
        note_success(&format!("Planner backend: {provider}"));
        true
    } else {
        note_error(&format!(
            "No {provider} backend is built into this binary; use the scripted provider"
        ));
        false
    }
}

fn check_operator(config: &PilotConfig) -> bool {
    let kind: OperatorKind = match config.operator.kind.parse() {
        Ok(kind) => kind,
        Err(e) => {
            note_error(&e.to_string());
            return false;
        }
    };
    if config.operator.settings.simulated.unwrap_or(false) {
        note_success(&format!("Operator: {kind} (simulated)"));
        true
    } else {
        note_error(&format!(
            "Operator: no {kind} driver is built into this binary; set operator.settings.simulated"
        ));
        false
    }
}

fn check_sessions(config: &PilotConfig) -> bool {
    match open_recorder(config.sessions.as_ref()) {
        Ok(recorder) => match recorder.history(1) {
            Ok(_) => {
                note_info("Session store is readable");
                true
            }
            Err(e) => {
                note_error(&format!("Session store: {e}"));
                false
            }
        },
        Err(e) => {
            note_error(&format!("Session store: {e}"));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lists_each_referenced_var_once() {
        let config = json!({
            "model": { "apiKey": "${OPENAI_API_KEY}", "baseUrl": "$${LITERAL}" },
            "sessions": { "path": "${DATA_DIR}/sessions.db" },
            "logging": { "dir": "${DATA_DIR}/logs" }
        });
        let vars = referenced_vars(&config, |name| name == "DATA_DIR");
        assert_eq!(
            vars,
            vec![
                ("DATA_DIR".to_string(), true),
                ("OPENAI_API_KEY".to_string(), false)
            ]
        );
    }

    #[test]
    fn plain_config_references_nothing() {
        let config = json!({ "model": { "provider": "scripted", "name": "replay" } });
        assert!(referenced_vars(&config, |_| false).is_empty());
    }
}
