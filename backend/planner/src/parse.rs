//! Strict parsing of model output into an `Analysis`.
//!
//! The model is asked for a JSON object; prose around it and Markdown code
//! fences are tolerated, missing fields are not.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use clawpilot_core::{Action, ActionType, Analysis};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireAnalysis {
    reasoning: Option<String>,
    confidence: Option<f64>,
    #[serde(alias = "is_complete", alias = "complete")]
    is_complete: Option<bool>,
    actions: Option<Vec<WireAction>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireAction {
    #[serde(rename = "type", alias = "action")]
    kind: String,
    #[serde(default)]
    parameters: Map<String, Value>,
    #[serde(default)]
    description: Option<String>,
}

impl WireAnalysis {
    pub(crate) fn into_analysis(self) -> Result<Analysis, String> {
        let mut missing = Vec::new();
        if self.reasoning.is_none() {
            missing.push("reasoning");
        }
        if self.confidence.is_none() {
            missing.push("confidence");
        }
        if self.is_complete.is_none() {
            missing.push("isComplete");
        }
        if !missing.is_empty() {
            return Err(format!("response is missing {}", missing.join(", ")));
        }

        let actions = self
            .actions
            .unwrap_or_default()
            .into_iter()
            .map(WireAction::into_action)
            .collect::<Result<Vec<_>, _>>()?;

        let analysis = Analysis {
            reasoning: self.reasoning.unwrap_or_default(),
            confidence: self.confidence.unwrap_or_default(),
            is_complete: self.is_complete.unwrap_or_default(),
            actions,
        };
        analysis.validate()?;
        Ok(analysis)
    }
}

impl WireAction {
    fn into_action(self) -> Result<Action, String> {
        let action_type: ActionType = self.kind.parse()?;
        Ok(Action {
            id: Uuid::new_v4().to_string(),
            action_type,
            parameters: self.parameters,
            timestamp: Utc::now(),
            description: self.description.filter(|d| !d.trim().is_empty()),
        })
    }
}

/// Parse raw model text into a validated `Analysis`.
pub fn parse_analysis(content: &str) -> Result<Analysis, String> {
    let json = extract_json_object(content).ok_or_else(|| {
        format!(
            "response contains no JSON object: {}",
            truncate(content.trim(), 120)
        )
    })?;
    let wire: WireAnalysis =
        serde_json::from_str(json).map_err(|e| format!("response is not a valid analysis: {e}"))?;
    wire.into_analysis()
}

/// Locate the JSON object in a model response.
fn extract_json_object(content: &str) -> Option<&str> {
    let body = fenced_block(content).unwrap_or(content);
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end > start).then(|| &body[start..=end])
}

fn fenced_block(content: &str) -> Option<&str> {
    let open = content.find("```")?;
    let after_fence = &content[open + 3..];
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
