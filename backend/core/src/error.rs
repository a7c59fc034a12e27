use std::fmt;

use thiserror::Error;

use crate::types::ActionResult;

/// Top-level error type for the ClawPilot runtime.
#[derive(Debug, Error)]
pub enum PilotError {
    /// Operator or planner setup failed; the run never starts.
    #[error("initialization failed: {0}")]
    Initialization(String),

    #[error("invalid instruction: {0}")]
    InvalidInstruction(String),

    /// The automation surface itself is broken (crashed process, lost connection).
    #[error("operator fault: {0}")]
    OperatorFault(String),

    /// Transport/authorization failure or unusable output from the planner.
    #[error("planner fault ({planner}): {message}")]
    PlannerFault { planner: String, message: String },

    #[error("session recorder error: {0}")]
    Recorder(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    RunFailed(Box<RunFailure>),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PilotError {
    pub fn planner(planner: impl Into<String>, message: impl Into<String>) -> Self {
        PilotError::PlannerFault {
            planner: planner.into(),
            message: message.into(),
        }
    }

    /// The wrapped run failure, if this error aborted a run.
    pub fn as_run_failure(&self) -> Option<&RunFailure> {
        match self {
            PilotError::RunFailed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// A run that ended in FAILED, with everything needed for a postmortem.
#[derive(Debug)]
pub struct RunFailure {
    pub iteration: u32,
    pub session_id: String,
    pub partial_results: Vec<ActionResult>,
    pub source: PilotError,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run failed at iteration {} (session {}, {} results recorded): {}",
            self.iteration,
            self.session_id,
            self.partial_results.len(),
            self.source
        )
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
