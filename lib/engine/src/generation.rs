//! Natural-language generation capability
//!
//! Produces the rationale paragraph from a [`RationalePrompt`]. Treated as
//! unreliable: the orchestrator bounds every call with a timeout and falls
//! back to the deterministic template on any error.

use async_trait::async_trait;
use resrank_scoring::RationalePrompt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Completion tokens requested never exceed this cap.
pub const COMPLETION_TOKEN_CAP: u32 = 350;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    /// The model answered with no text.
    #[error("Empty completion")]
    Empty,

    #[error("Configuration error: {0}")]
    Config(String),
}

#[async_trait]
pub trait RationaleGenerator: Send + Sync {
    async fn generate(&self, prompt: &RationalePrompt) -> Result<String, GenerationError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct ChatRationaleGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_completion_tokens: u32,
}

impl ChatRationaleGenerator {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com";

    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GenerationError::Config("API key is empty".to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: model.into(),
            max_completion_tokens: max_tokens.min(COMPLETION_TOKEN_CAP),
        })
    }

    pub fn max_completion_tokens(&self) -> u32 {
        self.max_completion_tokens
    }
}

#[async_trait]
impl RationaleGenerator for ChatRationaleGenerator {
    async fn generate(&self, prompt: &RationalePrompt) -> Result<String, GenerationError> {
        let system = prompt.system_message();
        let user = prompt.user_message();
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            max_completion_tokens: self.max_completion_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GenerationError::Api(format!("HTTP {}: {}", status, body)));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| GenerationError::Parse(e.to_string()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(GenerationError::Empty);
        }
        debug!(model = %self.model, chars = text.chars().count(), "Generated rationale");
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
