//! Model client trait and attempt-level failures

use async_trait::async_trait;
use feedcheck_core::AttemptOutcomeKind;

/// One external classification backend
///
/// Implementations perform a single call and return the raw assistant text.
/// Parsing, validation, retries, and timeouts belong to the model chain.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send `prompt` to `model` and return the raw response content
    async fn complete(&self, model: &str, prompt: &Prompt) -> Result<String, AttemptError>;

    /// Whether the upstream service is reachable; never errors
    async fn check_health(&self) -> bool;

    /// Get the client name
    fn name(&self) -> &str;
}

/// Which classification dimension a prompt asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Sentiment,
    Category,
}

/// A system/user message pair for one classification dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub system: String,
    pub user: String,
}

/// Failure of a single model attempt
///
/// Never crosses the model chain boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttemptError {
    #[error("attempt timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream returned status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("unparseable response: {0}")]
    Parse(String),

    #[error("response failed validation: {0}")]
    Invalid(String),
}

impl AttemptError {
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Outcome kind recorded for this failure
    pub fn outcome(&self) -> AttemptOutcomeKind {
        match self {
            Self::Timeout => AttemptOutcomeKind::Timeout,
            Self::Transport(_) | Self::Status { .. } => AttemptOutcomeKind::TransportError,
            Self::Parse(_) | Self::Invalid(_) => AttemptOutcomeKind::InvalidResponse,
        }
    }

    /// Whether another attempt against the same model may succeed
    ///
    /// Client-side statuses (bad request, bad key, unknown model) will not
    /// change on retry; 408 and 429 are the exceptions.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { code, .. } => {
                !(400..500).contains(code) || *code == 408 || *code == 429
            }
            _ => true,
        }
    }
}

impl From<reqwest::Error> for AttemptError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if let Some(status) = e.status() {
            Self::status(status.as_u16(), e.to_string())
        } else if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}
