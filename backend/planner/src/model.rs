use anyhow::Result;
use async_trait::async_trait;

/// A vision-capable model backend used by `ModelPlanner`.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Backend name (e.g., "openai").
    fn name(&self) -> &str;

    /// Send one prompt + image and return the response text.
    async fn complete(&self, request: &VisionRequest) -> Result<VisionResponse>;
}

/// Request to a vision model.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    /// Base64-encoded screenshot.
    pub image_base64: String,
    pub mime_type: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Response from a vision model.
#[derive(Debug, Clone)]
pub struct VisionResponse {
    pub content: String,
    pub model: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
}
