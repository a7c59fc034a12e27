use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ActionType, RunStatus};

/// A progress notification emitted by the engine.
/// Observational only: delivery is best-effort and never gates the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Events that can occur during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum EventKind {
    IterationStarted {
        iteration: u32,
        max_iterations: u32,
    },
    ScreenshotCaptured {
        iteration: u32,
        width: u32,
        height: u32,
    },
    AnalysisCompleted {
        iteration: u32,
        confidence: f64,
        is_complete: bool,
        action_count: usize,
        reasoning: String,
    },
    ActionStarted {
        iteration: u32,
        action_id: String,
        action_type: ActionType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    ActionCompleted {
        iteration: u32,
        action_id: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    NavigationCompleted {
        url: String,
        success: bool,
    },
    AgentPaused,
    AgentResumed,
    RunFinished {
        status: RunStatus,
        iterations: u32,
    },
}

impl EventKind {
    /// The wire name, e.g. `iteration-started`.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::IterationStarted { .. } => "iteration-started",
            EventKind::ScreenshotCaptured { .. } => "screenshot-captured",
            EventKind::AnalysisCompleted { .. } => "analysis-completed",
            EventKind::ActionStarted { .. } => "action-started",
            EventKind::ActionCompleted { .. } => "action-completed",
            EventKind::NavigationCompleted { .. } => "navigation-completed",
            EventKind::AgentPaused => "agent-paused",
            EventKind::AgentResumed => "agent-resumed",
            EventKind::RunFinished { .. } => "run-finished",
        }
    }
}

impl Event {
    pub fn new(session_id: Option<String>, kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            timestamp: Utc::now(),
            kind,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
