use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::PilotError;

/// Key in `ActionResult::data` carrying the result kind tag.
pub const DATA_ACTION: &str = "action";
/// Key in `ActionResult::data` carrying the iteration index.
pub const DATA_ITERATION: &str = "iteration";
/// Key in `ActionResult::data` carrying the surface URL, where known.
pub const DATA_URL: &str = "url";

/// The task text for one run. Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instruction(String);

impl Instruction {
    pub fn new(text: impl Into<String>) -> Result<Self, PilotError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(PilotError::InvalidInstruction(
                "instruction must not be empty".to_string(),
            ));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which automation surface an operator drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorKind {
    Desktop,
    Browser,
    Hybrid,
}

impl OperatorKind {
    /// Whether this surface can follow a `NAVIGATE` action.
    pub fn can_navigate(self) -> bool {
        !matches!(self, OperatorKind::Desktop)
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperatorKind::Desktop => "desktop",
            OperatorKind::Browser => "browser",
            OperatorKind::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

impl FromStr for OperatorKind {
    type Err = PilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Ok(OperatorKind::Desktop),
            "browser" => Ok(OperatorKind::Browser),
            "hybrid" => Ok(OperatorKind::Hybrid),
            other => Err(PilotError::Initialization(format!(
                "unknown operator type '{other}'"
            ))),
        }
    }
}

/// The kinds of UI action a planner may propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Navigate,
    Click,
    DoubleClick,
    Type,
    Key,
    Scroll,
    Wait,
}

impl ActionType {
    pub const ALL: [ActionType; 7] = [
        ActionType::Navigate,
        ActionType::Click,
        ActionType::DoubleClick,
        ActionType::Type,
        ActionType::Key,
        ActionType::Scroll,
        ActionType::Wait,
    ];

    /// Lower-case tag written into `ActionResult::data["action"]`.
    pub fn tag(self) -> &'static str {
        match self {
            ActionType::Navigate => "navigate",
            ActionType::Click => "click",
            ActionType::DoubleClick => "double_click",
            ActionType::Type => "type",
            ActionType::Key => "key",
            ActionType::Scroll => "scroll",
            ActionType::Wait => "wait",
        }
    }

    /// Parameters an action of this type cannot do without.
    pub fn required_parameters(self) -> &'static [&'static str] {
        match self {
            ActionType::Navigate => &["url"],
            ActionType::Type => &["text"],
            ActionType::Key => &["key"],
            _ => &[],
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ActionType::ALL
            .into_iter()
            .find(|t| t.tag() == normalized)
            .ok_or_else(|| format!("unknown action type '{s}'"))
    }
}

/// One proposed UI step. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Action {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action_type,
            parameters: Map::new(),
            timestamp: Utc::now(),
            description: None,
        }
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        Self::new(ActionType::Navigate).with_param("url", url.into())
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    pub fn i64_param(&self, key: &str) -> Option<i64> {
        self.parameters.get(key).and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_f64().map(|f| f.round() as i64))
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        })
    }

    /// Check that the parameters required by the action type are present.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("action id is empty".to_string());
        }
        for key in self.action_type.required_parameters() {
            match self.parameters.get(*key) {
                Some(Value::String(s)) if !s.is_empty() => {}
                Some(Value::String(_)) | None | Some(Value::Null) => {
                    return Err(format!(
                        "{} action '{}' is missing parameter '{}'",
                        self.action_type, self.id, key
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// What an `ActionResult` records: a bookkeeping artifact or a real step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Screenshot,
    AiAnalysis,
    TaskComplete,
    Action(ActionType),
    Unknown,
}

impl ResultKind {
    pub fn tag(self) -> &'static str {
        match self {
            ResultKind::Screenshot => "screenshot",
            ResultKind::AiAnalysis => "ai_analysis",
            ResultKind::TaskComplete => "task_complete",
            ResultKind::Action(t) => t.tag(),
            ResultKind::Unknown => "unknown",
        }
    }

    fn from_tag(tag: &str) -> Self {
        match tag {
            "screenshot" => ResultKind::Screenshot,
            "ai_analysis" => ResultKind::AiAnalysis,
            "task_complete" => ResultKind::TaskComplete,
            other => other
                .parse::<ActionType>()
                .map(ResultKind::Action)
                .unwrap_or(ResultKind::Unknown),
        }
    }

    pub fn is_bookkeeping(self) -> bool {
        matches!(
            self,
            ResultKind::Screenshot | ResultKind::AiAnalysis | ResultKind::TaskComplete
        )
    }
}

/// Outcome of one step, bookkeeping or real. Immutable once appended.
///
/// `data` is an open map: fields this crate does not know about are kept
/// verbatim rather than rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl ActionResult {
    pub fn ok(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: true,
            error: None,
            data: Map::new(),
        }
    }

    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: false,
            error: Some(error.into()),
            data: Map::new(),
        }
    }

    /// A bookkeeping artifact tagged with its kind and iteration.
    pub fn artifact(kind: ResultKind, iteration: u32) -> Self {
        Self::ok(format!("{}-{}", kind.tag(), iteration))
            .with_data(DATA_ACTION, kind.tag())
            .with_data(DATA_ITERATION, iteration)
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> ResultKind {
        self.data
            .get(DATA_ACTION)
            .and_then(Value::as_str)
            .map(ResultKind::from_tag)
            .unwrap_or(ResultKind::Unknown)
    }

    /// True for results of actual automation steps.
    pub fn is_real(&self) -> bool {
        matches!(self.kind(), ResultKind::Action(_))
    }

    pub fn iteration(&self) -> Option<u32> {
        self.data
            .get(DATA_ITERATION)
            .and_then(Value::as_u64)
            .and_then(|i| u32::try_from(i).ok())
    }

    pub fn url(&self) -> Option<&str> {
        self.data.get(DATA_URL).and_then(Value::as_str)
    }
}

/// Encoding of `Screenshot::image_data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Visual state of a surface at capture time. Lives for one iteration.
#[derive(Clone, PartialEq)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub timestamp: DateTime<Utc>,
    pub format: ImageFormat,
    pub image_data: Vec<u8>,
}

impl fmt::Debug for Screenshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Screenshot")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("timestamp", &self.timestamp)
            .field("format", &self.format)
            .field("bytes", &self.image_data.len())
            .finish()
    }
}

/// One planning result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub reasoning: String,
    pub confidence: f64,
    pub is_complete: bool,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Analysis {
    /// Reject planner output the engine cannot act on.
    pub fn validate(&self) -> Result<(), String> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "confidence {} is outside [0, 1]",
                self.confidence
            ));
        }
        for action in &self.actions {
            action.validate()?;
        }
        Ok(())
    }
}

/// Append-only log of one run's results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub instruction: String,
    pub results: Vec<ActionResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(instruction: &Instruction) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            instruction: instruction.as_str().to_string(),
            results: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Best-effort description of where an operator currently is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
}

/// Why the engine ended a run early.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// The planner proposed no actions.
    NoActions,
    /// Success rate of the latest real results fell below the floor.
    UnproductiveLoop { success_rate: f64 },
    /// The planner reported too little confidence.
    LowConfidence { confidence: f64 },
    /// Too many of the latest real results failed.
    RepeatedFailure { failures: usize, window: usize },
    /// `stop()` was requested.
    Stopped,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::NoActions => write!(f, "planner proposed no actions"),
            StopReason::UnproductiveLoop { success_rate } => {
                write!(f, "recent success rate {:.2} is too low", success_rate)
            }
            StopReason::LowConfidence { confidence } => {
                write!(f, "planner confidence {:.2} is too low", confidence)
            }
            StopReason::RepeatedFailure { failures, window } => {
                write!(f, "{failures} of the last {window} actions failed")
            }
            StopReason::Stopped => write!(f, "stopped on request"),
        }
    }
}

/// Terminal status of a run that did not fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Exhausted,
    Aborted { stop: StopReason },
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Exhausted => write!(f, "exhausted"),
            RunStatus::Aborted { stop } => write!(f, "aborted ({stop})"),
        }
    }
}

/// What `execute` hands back for COMPLETED, EXHAUSTED and ABORTED runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub session_id: String,
    pub status: RunStatus,
    pub iterations: u32,
    pub results: Vec<ActionResult>,
}

impl RunReport {
    pub fn real_results(&self) -> impl Iterator<Item = &ActionResult> {
        self.results.iter().filter(|r| r.is_real())
    }

    pub fn count_kind(&self, kind: ResultKind) -> usize {
        self.results.iter().filter(|r| r.kind() == kind).count()
    }
}
