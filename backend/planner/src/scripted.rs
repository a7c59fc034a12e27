use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use clawpilot_core::{ActionResult, Analysis, Instruction, PilotError, Planner, Screenshot};

use crate::parse::WireAnalysis;

/// Replays a fixed sequence of analyses, one per call.
///
/// Once the script runs out it answers with an analysis proposing nothing,
/// which makes the engine abort rather than loop.
pub struct ScriptedPlanner {
    script: Vec<Analysis>,
    cursor: AtomicUsize,
}

impl ScriptedPlanner {
    pub fn new(script: Vec<Analysis>) -> Self {
        Self {
            script,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Load a JSON array of analyses.
    pub fn from_file(path: &Path) -> Result<Self, PilotError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PilotError::Initialization(format!("cannot read script {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
            .map_err(|e| PilotError::Initialization(format!("script {}: {e}", path.display())))
    }

    pub fn from_json(raw: &str) -> Result<Self, String> {
        let entries: Vec<Value> =
            serde_json::from_str(raw).map_err(|e| format!("expected a JSON array: {e}"))?;
        let script = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                serde_json::from_value::<WireAnalysis>(entry)
                    .map_err(|e| e.to_string())
                    .and_then(WireAnalysis::into_analysis)
                    .map_err(|e| format!("entry {i}: {e}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        info!(steps = script.len(), "Loaded planner script");
        Ok(Self::new(script))
    }

    pub fn remaining(&self) -> usize {
        self.script
            .len()
            .saturating_sub(self.cursor.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn analyze_screenshot(
        &self,
        _screenshot: &Screenshot,
        _instruction: &Instruction,
        iteration: u32,
        _prior_results: &[ActionResult],
    ) -> Result<Analysis, PilotError> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        match self.script.get(index) {
            Some(analysis) => {
                debug!(iteration, step = index, "Replaying scripted analysis");
                // Fresh ids per replay so repeated runs never share action ids.
                let mut analysis = analysis.clone();
                for action in &mut analysis.actions {
                    action.id = uuid::Uuid::new_v4().to_string();
                    action.timestamp = chrono::Utc::now();
                }
                Ok(analysis)
            }
            None => Ok(Analysis {
                reasoning: "script exhausted".to_string(),
                confidence: 0.0,
                is_complete: false,
                actions: Vec::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clawpilot_core::{ActionType, ImageFormat};
    use std::io::Write;

    fn screenshot() -> Screenshot {
        Screenshot {
            width: 1,
            height: 1,
            timestamp: Utc::now(),
            format: ImageFormat::Png,
            image_data: Vec::new(),
        }
    }

    const SCRIPT: &str = r#"[
        {"reasoning":"click it","confidence":0.9,"isComplete":false,
         "actions":[{"type":"CLICK","parameters":{"x":5,"y":5}}]},
        {"reasoning":"done","confidence":0.95,"isComplete":true}
    ]"#;

    #[tokio::test]
    async fn replays_then_runs_dry() {
        let planner = ScriptedPlanner::from_json(SCRIPT).unwrap();
        let instruction = Instruction::new("x").unwrap();

        let first = planner
            .analyze_screenshot(&screenshot(), &instruction, 1, &[])
            .await
            .unwrap();
        assert_eq!(first.actions[0].action_type, ActionType::Click);

        let second = planner
            .analyze_screenshot(&screenshot(), &instruction, 2, &[])
            .await
            .unwrap();
        assert!(second.is_complete);
        assert_eq!(planner.remaining(), 0);

        let third = planner
            .analyze_screenshot(&screenshot(), &instruction, 3, &[])
            .await
            .unwrap();
        assert!(!third.is_complete);
        assert!(third.actions.is_empty());
    }

    #[test]
    fn rejects_incomplete_entries() {
        let err = ScriptedPlanner::from_json(r#"[{"reasoning":"x"}]"#).err().unwrap();
        assert!(err.contains("entry 0"));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCRIPT.as_bytes()).unwrap();
        let planner = ScriptedPlanner::from_file(file.path()).unwrap();
        assert_eq!(planner.remaining(), 2);
    }

    #[test]
    fn missing_file_is_an_initialization_error() {
        let err = ScriptedPlanner::from_file(Path::new("/nonexistent/plan.json"))
            .err()
            .unwrap();
        assert!(matches!(err, PilotError::Initialization(_)));
    }
}
