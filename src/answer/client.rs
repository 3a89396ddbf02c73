//! Chat-completions client for the language model provider
//!
//! The `ChatProvider` trait abstracts the upstream model so the answering
//! pipeline can be exercised without network access. `GroqClient` talks to
//! any OpenAI-compatible chat-completions endpoint (Groq by default).

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::LlmConfig;

#[derive(Error, Debug)]
pub enum LlmError {
    /// Upstream applied its rate limit; never retried silently
    #[error("rate limited{}", .retry_after_secs.map(|s| format!(", retry after {}s", s)).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    /// Non-success response from the API
    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A single chat completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub prompt: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

/// Abstraction over the chat model backend
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Run one completion. Exactly one upstream call per invocation; retry
    /// policy belongs to the caller.
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError>;
}

/// Client for an OpenAI-compatible chat-completions API
pub struct GroqClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GroqClient {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChatProvider for GroqClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let body = ApiRequest {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![ApiMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.trim())
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(LlmError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ApiResponse = response.json().await?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::Api {
                status: status.as_u16(),
                message: "response contained no choices".to_string(),
            })?;

        Ok(answer)
    }
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}
