//! Prompt builder for vision-model planners.

use clawpilot_core::{ActionResult, ActionType, Instruction};

const RESPONSE_SCHEMA: &str = r#"{
  "reasoning": "what you see and why you chose the next step",
  "confidence": 0.0,
  "isComplete": false,
  "actions": [
    {"type": "CLICK", "parameters": {"x": 100, "y": 200}, "description": "open the menu"}
  ]
}"#;

pub struct PromptBuilder {
    history_window: usize,
}

impl PromptBuilder {
    pub fn new(history_window: usize) -> Self {
        Self { history_window }
    }

    /// System prompt: role, action vocabulary and response format.
    pub fn system_prompt(&self) -> String {
        let vocabulary = ActionType::ALL
            .iter()
            .map(|t| {
                let required = t.required_parameters();
                if required.is_empty() {
                    format!("- {}", t.tag().to_ascii_uppercase())
                } else {
                    format!(
                        "- {} (requires: {})",
                        t.tag().to_ascii_uppercase(),
                        required.join(", ")
                    )
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are a UI automation planner. You receive a screenshot of the current \
             screen and a task. Decide whether the task is already complete and, if not, \
             propose the next few actions.\n\n\
             ACTIONS:\n{vocabulary}\n\n\
             RULES:\n\
             1. Respond with a single JSON object and nothing else.\n\
             2. confidence is your certainty in [0, 1].\n\
             3. Set isComplete to true only when the screenshot shows the task is done.\n\
             4. Return an empty actions list if you cannot make progress.\n\n\
             FORMAT:\n{RESPONSE_SCHEMA}"
        )
    }

    /// User prompt: the task, where we are, and what happened recently.
    pub fn user_prompt(
        &self,
        instruction: &Instruction,
        iteration: u32,
        prior_results: &[ActionResult],
    ) -> String {
        let mut prompt = format!("TASK: {instruction}\nITERATION: {iteration}\n");

        if let Some(url) = prior_results.iter().rev().find_map(ActionResult::url) {
            prompt.push_str(&format!("CURRENT URL: {url}\n"));
        }

        let recent: Vec<&ActionResult> = prior_results.iter().filter(|r| r.is_real()).collect();
        let skip = recent.len().saturating_sub(self.history_window);
        let recent = &recent[skip..];

        if recent.is_empty() {
            prompt.push_str("\nNo actions have been taken yet.");
        } else {
            prompt.push_str("\nRECENT ACTIONS:\n");
            for result in recent {
                prompt.push_str(&summarize(result));
                prompt.push('\n');
            }
        }
        prompt
    }
}

fn summarize(result: &ActionResult) -> String {
    let iteration = result
        .iteration()
        .map(|i| format!("[{i}] "))
        .unwrap_or_default();
    let kind = result.kind().tag();
    match (&result.error, result.success) {
        (_, true) => format!("- {iteration}{kind}: ok"),
        (Some(err), false) => format!("- {iteration}{kind}: failed ({err})"),
        (None, false) => format!("- {iteration}{kind}: failed"),
    }
}
