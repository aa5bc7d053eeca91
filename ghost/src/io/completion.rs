//! Completion service boundary and the OpenAI-compatible chat client.
//!
//! The loop only ever sees [`CompletionService`]: an ordered list of turns goes in and a
//! single block of text comes out. Retries and rate limiting are not handled here.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::core::types::Turn;
use crate::io::config::GhostConfig;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Errors from completion calls.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("missing API key: {0}")]
    MissingApiKey(String),
}

/// One completion call: the conversation plus an output token ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub turns: Vec<Turn>,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(turns: Vec<Turn>, max_tokens: u32) -> Self {
        Self { turns, max_tokens }
    }
}

/// Opaque text-completion collaborator.
pub trait CompletionService {
    /// Return the raw completion text for `request`.
    fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

impl<T: CompletionService + ?Sized> CompletionService for &T {
    fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        (**self).complete(request)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Blocking client for `POST {base_url}/chat/completions`.
#[derive(Debug)]
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
}

impl OpenAiClient {
    /// Build a client from config, reading the key from `OPENAI_API_KEY`.
    pub fn from_config(cfg: &GhostConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
        Self::with_api_key(api_key, cfg)
    }

    pub fn with_api_key(api_key: impl Into<String>, cfg: &GhostConfig) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey(format!("{API_KEY_ENV} not set")));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl CompletionService for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.model, max_tokens = request.max_tokens, turns = request.turns.len()))]
    fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: &request.turns,
            temperature: self.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(endpoint = %self.endpoint(), "sending chat completion");
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok());
            warn!(?retry_after, "completion rate limited");
            return Err(LlmError::RateLimited { retry_after });
        }
        if status >= 400 {
            let message = response.text().unwrap_or_else(|_| "(no body)".into());
            warn!(status, "completion request rejected");
            return Err(LlmError::ApiError { status, message });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| LlmError::InvalidResponse(format!("failed to parse response: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("response has no message content".into()))?;

        debug!(chars = content.len(), "completion received");
        Ok(content.trim().to_string())
    }
}
