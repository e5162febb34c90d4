//! Reasoning/synthesis provider.

use async_trait::async_trait;
use rig::completion::Prompt;
use rig::providers::openai;

use crate::error::{ProviderError, ProviderResult};
use crate::gateway::ProviderKind;

/// LLM completion abstraction.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Complete a prompt with the default model (returns raw text).
    async fn complete(&self, api_key: &str, prompt: &str) -> ProviderResult<String>;

    /// Complete a prompt with a specific model.
    ///
    /// If model is None, uses the default model.
    async fn complete_with_model(
        &self,
        api_key: &str,
        prompt: &str,
        model: Option<&str>,
    ) -> ProviderResult<String> {
        let _ = model;
        self.complete(api_key, prompt).await
    }
}

/// OpenAI implementation on the rig framework.
pub struct OpenAiReasoner {
    preamble: String,
    max_tokens: u64,
}

impl Default for OpenAiReasoner {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiReasoner {
    /// Create a reasoner with the default sales-research preamble.
    pub fn new() -> Self {
        Self {
            preamble: "You are a meticulous B2B sales research analyst.".to_string(),
            max_tokens: 4096,
        }
    }

    /// Override the system preamble.
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    /// Override the completion token budget.
    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Classify a rig prompt error into the gateway's taxonomy.
    ///
    /// rig surfaces provider HTTP failures as strings, so throttling and
    /// revocation are recognized by content.
    fn classify_error(e: impl std::fmt::Display) -> ProviderError {
        let provider = ProviderKind::Reasoning;
        let text = e.to_string();
        let lowered = text.to_lowercase();

        if lowered.contains("429") || lowered.contains("rate limit") {
            ProviderError::RateLimited {
                provider,
                retry_after: None,
            }
        } else if lowered.contains("401")
            || lowered.contains("invalid api key")
            || lowered.contains("unauthorized")
        {
            ProviderError::Unauthorized { provider }
        } else {
            ProviderError::Http {
                provider,
                source: text.into(),
            }
        }
    }
}

#[async_trait]
impl Reasoner for OpenAiReasoner {
    async fn complete(&self, api_key: &str, prompt: &str) -> ProviderResult<String> {
        self.complete_with_model(api_key, prompt, None).await
    }

    async fn complete_with_model(
        &self,
        api_key: &str,
        prompt: &str,
        model: Option<&str>,
    ) -> ProviderResult<String> {
        let client = openai::Client::new(api_key);

        tracing::debug!(
            prompt_length = prompt.len(),
            model = model.unwrap_or("default"),
            "building reasoning agent"
        );

        let agent = match model {
            Some("gpt-4o") => client
                .agent(openai::GPT_4O)
                .preamble(&self.preamble)
                .max_tokens(self.max_tokens)
                .build(),
            _ => client
                .agent(openai::GPT_4_TURBO)
                .preamble(&self.preamble)
                .max_tokens(self.max_tokens)
                .build(),
        };

        let response = agent.prompt(prompt).await.map_err(Self::classify_error)?;

        tracing::debug!(response_length = response.len(), "reasoning response received");

        Ok(response)
    }
}
