use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, info, warn};

use clawpilot_config::defaults::DEFAULT_HISTORY_WINDOW;
use clawpilot_config::ModelConfig;
use clawpilot_core::{ActionResult, Analysis, Instruction, PilotError, Planner, Screenshot};

use crate::model::{VisionModel, VisionRequest};
use crate::parse::parse_analysis;
use crate::prompt::PromptBuilder;

const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Planner backed by a vision model: one request per iteration, strict parsing
/// of the reply.
pub struct ModelPlanner {
    model: Arc<dyn VisionModel>,
    model_name: String,
    prompts: PromptBuilder,
    max_tokens: u32,
    temperature: f32,
}

impl ModelPlanner {
    pub fn new(model: Arc<dyn VisionModel>, config: &ModelConfig) -> Self {
        let params = &config.parameters;
        Self {
            model,
            model_name: config.name.clone(),
            prompts: PromptBuilder::new(params.history_window.unwrap_or(DEFAULT_HISTORY_WINDOW)),
            max_tokens: params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: params.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        }
    }

    fn build_request(
        &self,
        screenshot: &Screenshot,
        instruction: &Instruction,
        iteration: u32,
        prior_results: &[ActionResult],
    ) -> VisionRequest {
        VisionRequest {
            model: self.model_name.clone(),
            system_prompt: self.prompts.system_prompt(),
            user_prompt: self.prompts.user_prompt(instruction, iteration, prior_results),
            image_base64: BASE64.encode(&screenshot.image_data),
            mime_type: screenshot.format.mime_type().to_string(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl Planner for ModelPlanner {
    fn name(&self) -> &str {
        self.model.name()
    }

    async fn analyze_screenshot(
        &self,
        screenshot: &Screenshot,
        instruction: &Instruction,
        iteration: u32,
        prior_results: &[ActionResult],
    ) -> Result<Analysis, PilotError> {
        let request = self.build_request(screenshot, instruction, iteration, prior_results);
        debug!(
            backend = self.model.name(),
            model = %request.model,
            iteration,
            image_bytes = screenshot.image_data.len(),
            "Requesting analysis"
        );

        let start = Instant::now();
        let response = self.model.complete(&request).await.map_err(|e| {
            warn!(backend = self.model.name(), error = %e, "Vision model call failed");
            PilotError::planner(self.model.name(), e.to_string())
        })?;

        let analysis = parse_analysis(&response.content)
            .map_err(|message| PilotError::planner(self.model.name(), message))?;

        info!(
            backend = self.model.name(),
            iteration,
            confidence = analysis.confidence,
            is_complete = analysis.is_complete,
            actions = analysis.actions.len(),
            tokens = response.tokens_used,
            latency_ms = start.elapsed().as_millis() as u64,
            "Analysis received"
        );
        Ok(analysis)
    }
}
