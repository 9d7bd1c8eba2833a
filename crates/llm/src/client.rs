//! HTTP client for the chat-completions proposal source.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use sqlshadow_core::collaborators::{ProposalContext, ProposalResponse, ProposalSource};
use sqlshadow_core::error::CollaboratorError;

use crate::{parse, prompt};

/// Sampling temperature: low, for more deterministic output.
const TEMPERATURE: f64 = 0.1;

/// Proposal-source configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible endpoint
    /// (default: `https://api.openai.com/v1`).
    pub base_url: String,
    /// Bearer token; empty for endpoints that need none (e.g. Ollama).
    pub api_key: String,
    /// Model name (default: `gpt-4o-mini`).
    pub model: String,
    /// Per-call timeout in seconds (default: `60`).
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var            | Default                     |
    /// |--------------------|-----------------------------|
    /// | `LLM_BASE_URL`     | `https://api.openai.com/v1` |
    /// | `LLM_API_KEY`      | *(empty)*                   |
    /// | `LLM_MODEL`        | `gpt-4o-mini`               |
    /// | `LLM_TIMEOUT_SECS` | `60`                        |
    pub fn from_env() -> Self {
        let base_url = std::env::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let api_key = std::env::var("LLM_API_KEY").unwrap_or_default();
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        let timeout_secs: u64 = std::env::var("LLM_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("LLM_TIMEOUT_SECS must be a valid u64");
        Self {
            base_url,
            api_key,
            model,
            timeout_secs,
        }
    }

    /// Whether a credential is configured (for health reporting only;
    /// keyless endpoints are legitimate).
    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Chat-completions client implementing the proposal-source contract.
pub struct OpenAiChatClient {
    client: reqwest::Client,
    config: LlmConfig,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiChatClient {
    pub fn new(config: LlmConfig) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;
        tracing::info!(
            base_url = %config.base_url,
            model = %config.model,
            "Initialized proposal source"
        );
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl ProposalSource for OpenAiChatClient {
    async fn propose(
        &self,
        context: &ProposalContext,
    ) -> Result<ProposalResponse, CollaboratorError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "temperature": TEMPERATURE,
            "messages": [
                { "role": "system", "content": prompt::SYSTEM_PROMPT },
                { "role": "user", "content": prompt::user_message(context) },
            ],
        });

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let mut request = self.client.post(&url).json(&body);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CollaboratorError::Timeout(self.config.timeout_secs)
            } else {
                CollaboratorError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Unavailable(format!(
                "proposal source returned {status}: {detail}"
            )));
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::InvalidResponse(e.to_string()))?;

        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                CollaboratorError::InvalidResponse("empty completion".to_string())
            })?;

        tracing::debug!(attempt = context.attempt, "Received proposal completion");
        parse::parse_proposal(&content)
    }
}
