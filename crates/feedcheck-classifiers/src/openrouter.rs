//! OpenRouter chat completions client
//!
//! Free-tier calls are rejected unless every request carries the
//! `HTTP-Referer` and `X-Title` identification headers.

use crate::client::{AttemptError, ModelClient, Prompt};
use async_trait::async_trait;
use feedcheck_core::{Error, Result, UpstreamConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// A chat message in the request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,

    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletion {
    fn into_content(self) -> Option<String> {
        self.choices.into_iter().next().and_then(|c| c.message.content)
    }
}

/// HTTP client for the OpenRouter API
#[derive(Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    referer: String,
    title: String,
    temperature: f32,
    max_tokens: u32,
    health_timeout: Duration,
}

impl OpenRouterClient {
    /// Build a client; fails without a credential
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::config("upstream.api_key is not set"))?;

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            referer: config.app_url.clone(),
            title: config.app_title.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            health_timeout: config.health_timeout(),
        })
    }

    /// Chat completion request for `prompt` against `model`
    ///
    /// The body names only `model`, never a fallback list. Model preference
    /// order is owned by `ModelChain`, which issues one request per model so
    /// every attempt is retried, timed and counted on its own.
    pub fn request(&self, model: &str, prompt: &Prompt) -> reqwest::RequestBuilder {
        let body = ChatRequest {
            model,
            messages: vec![
                ChatMessage::system(prompt.system.as_str()),
                ChatMessage::user(prompt.user.as_str()),
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };

        self.http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&body)
    }
}

#[async_trait]
impl ModelClient for OpenRouterClient {
    async fn complete(&self, model: &str, prompt: &Prompt) -> std::result::Result<String, AttemptError> {
        let response = self.request(model, prompt).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match status.as_u16() {
                429 => "rate limit exceeded".to_string(),
                401 => "invalid API key".to_string(),
                _ => body.chars().take(200).collect(),
            };
            return Err(AttemptError::status(status.as_u16(), message));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| AttemptError::Parse(format!("malformed completion envelope: {e}")))?;

        completion
            .into_content()
            .ok_or_else(|| AttemptError::Parse("completion has no content".to_string()))
    }

    async fn check_health(&self) -> bool {
        let result = self
            .http
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.health_timeout)
            .send()
            .await;

        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("upstream health probe failed: {}", e);
                false
            }
        }
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}
