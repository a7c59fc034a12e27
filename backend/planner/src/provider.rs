use std::fmt;
use std::str::FromStr;

use clawpilot_core::PilotError;

/// Model providers a planner can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelProvider {
    OpenAi,
    Anthropic,
    Google,
    Ollama,
    OpenRouter,
    /// Replays analyses from a script file; no model involved.
    Scripted,
}

impl ModelProvider {
    pub const ALL: [ModelProvider; 6] = [
        ModelProvider::OpenAi,
        ModelProvider::Anthropic,
        ModelProvider::Google,
        ModelProvider::Ollama,
        ModelProvider::OpenRouter,
        ModelProvider::Scripted,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ModelProvider::OpenAi => "openai",
            ModelProvider::Anthropic => "anthropic",
            ModelProvider::Google => "google",
            ModelProvider::Ollama => "ollama",
            ModelProvider::OpenRouter => "openrouter",
            ModelProvider::Scripted => "scripted",
        }
    }

    /// Hosted providers refuse requests without credentials.
    pub fn requires_api_key(self) -> bool {
        matches!(
            self,
            ModelProvider::OpenAi
                | ModelProvider::Anthropic
                | ModelProvider::Google
                | ModelProvider::OpenRouter
        )
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ModelProvider {
    type Err = PilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ModelProvider::OpenAi),
            "anthropic" | "claude" => Ok(ModelProvider::Anthropic),
            "google" | "gemini" => Ok(ModelProvider::Google),
            "ollama" => Ok(ModelProvider::Ollama),
            "openrouter" => Ok(ModelProvider::OpenRouter),
            "scripted" => Ok(ModelProvider::Scripted),
            other => Err(PilotError::Initialization(format!(
                "unknown model provider '{other}'"
            ))),
        }
    }
}
