//! `clawpilot run`: build the engine from config and drive one instruction.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tracing::{info, warn};

use clawpilot_agent::{EngineSettings, ExecutionEngine};
use clawpilot_config::PilotConfig;
use clawpilot_core::{
    Event, EventKind, EventPort, FanOut, Instruction, PilotError, RunReport, RunStatus,
};
use clawpilot_logging::{init_logger, EventLogger, LoggerOptions};
use clawpilot_operator::OperatorFactory;
use clawpilot_planner::PlannerFactory;
use clawpilot_recorder::open_recorder;

use crate::terminal_output::{
    note_error, note_info, note_success, note_warn, render_table, supports_color, Column, DIM,
    GREEN, RED, RESET,
};

/// Exit status for runs that ended without completing the task.
const EXIT_INCOMPLETE: u8 = 2;

pub async fn run(config: PilotConfig, instruction: &str, json: bool) -> Result<ExitCode> {
    let logging = config.logging.clone().unwrap_or_default();
    init_logger(&LoggerOptions {
        level: logging.level.unwrap_or_else(|| "info".to_string()),
        log_dir: logging.dir.map(PathBuf::from),
        json: logging.json.unwrap_or(false),
    });

    match drive(&config, instruction, !json).await {
        Ok(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            Ok(match report.status {
                RunStatus::Completed => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_INCOMPLETE),
            })
        }
        Err(PilotError::RunFailed(failure)) => {
            if json {
                let body = json!({
                    "sessionId": failure.session_id,
                    "iteration": failure.iteration,
                    "error": failure.source.to_string(),
                    "partialResults": failure.partial_results,
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                note_error(&failure.to_string());
            }
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(anyhow::Error::new(e).context("Run could not start")),
    }
}

/// Build the engine from `config` and run `instruction` once.
async fn drive(
    config: &PilotConfig,
    instruction: &str,
    show_progress: bool,
) -> Result<RunReport, PilotError> {
    let instruction = Instruction::new(instruction)?;
    let operator = OperatorFactory::new().build(&config.operator)?;
    let planner = PlannerFactory::new().build(&config.model)?;
    let recorder = open_recorder(config.sessions.as_ref())?;

    let mut events = FanOut::new().with(Arc::new(EventLogger::new()));
    if show_progress {
        events = events.with(Arc::new(Progress));
    }

    let mut engine = ExecutionEngine::new(
        operator,
        planner,
        recorder,
        Arc::new(events),
        EngineSettings::from(&config.settings),
    );

    let handle = engine.handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping after the current action");
            handle.stop();
        }
    });

    info!(operator = %config.operator.kind, provider = %config.model.provider, "Starting run");
    let outcome = engine.execute(&instruction).await;
    interrupt.abort();
    engine.stop().await;
    outcome
}

fn print_report(report: &RunReport) {
    let summary = format!(
        "{} after {} iteration(s) (session {})",
        report.status, report.iterations, report.session_id
    );
    match report.status {
        RunStatus::Completed => note_success(&summary),
        _ => note_warn(&summary),
    }

    let rows: Vec<Vec<String>> = report
        .real_results()
        .map(|r| {
            vec![
                r.iteration().map(|i| i.to_string()).unwrap_or_default(),
                r.kind().tag().to_string(),
                if r.success { "ok".into() } else { "failed".into() },
                r.error.clone().unwrap_or_default(),
            ]
        })
        .collect();
    if rows.is_empty() {
        note_info("No actions were executed.");
    } else {
        let columns = [
            Column::right("Iter"),
            Column::left("Action"),
            Column::left("Result"),
            Column::left("Error").max_width(60),
        ];
        print!("{}", render_table(&columns, &rows));
    }
}

/// Live one-line-per-step progress on stdout.
struct Progress;

impl EventPort for Progress {
    fn emit(&self, event: Event) {
        if let Some(line) = progress_line(&event.kind, supports_color()) {
            println!("{line}");
        }
    }
}

fn progress_line(kind: &EventKind, color: bool) -> Option<String> {
    let (ok, bad, dim, reset) = if color {
        (GREEN, RED, DIM, RESET)
    } else {
        ("", "", "", "")
    };
    match kind {
        EventKind::IterationStarted {
            iteration,
            max_iterations,
        } => Some(format!("Iteration {iteration}/{max_iterations}")),
        EventKind::AnalysisCompleted {
            confidence,
            reasoning,
            ..
        } => Some(format!("  {dim}[{confidence:.2}] {reasoning}{reset}")),
        EventKind::ActionStarted {
            action_type,
            description,
            ..
        } => Some(match description {
            Some(d) => format!("  -> {action_type}: {d}"),
            None => format!("  -> {action_type}"),
        }),
        EventKind::ActionCompleted {
            success: false,
            error,
            ..
        } => Some(format!(
            "     {bad}failed{reset}: {}",
            error.as_deref().unwrap_or("unknown error")
        )),
        EventKind::NavigationCompleted { url, success: true } => {
            Some(format!("     {ok}at{reset} {url}"))
        }
        EventKind::AgentPaused => Some("Paused".to_string()),
        EventKind::AgentResumed => Some("Resumed".to_string()),
        _ => None,
    }
}
