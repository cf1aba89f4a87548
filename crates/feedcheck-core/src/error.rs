//! Error types for feedcheck
//!
//! Only [`Error::Input`] and [`Error::RateLimited`] are produced by
//! `Analyzer::analyze`. Model attempt failures are absorbed by the model chain
//! and never surface here.

use std::time::Duration;

/// Result type alias using feedcheck's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for feedcheck operations
///
/// `Clone` so one coalesced computation can hand its outcome to every waiter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Rejected input; never retried
    #[error("invalid input: {0}")]
    Input(#[from] InputError),

    /// The rate gate refused admission
    #[error("rate limit exceeded, retry after {}ms", retry_after.as_millis())]
    RateLimited {
        /// Suggested delay before the caller tries again
        retry_after: Duration,
    },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// A background computation was aborted before producing a result
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new rate-limited error
    pub fn rate_limited(retry_after: Duration) -> Self {
        Self::RateLimited { retry_after }
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Suggested retry delay, if this is a rate-limit rejection
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Whether this error is a caller-side input problem
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input(_))
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

/// Input validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("feedback text cannot be empty")]
    EmptyText,

    #[error("feedback text has {len} characters, limit is {max}")]
    TextTooLong { len: usize, max: usize },

    #[error("{count} tags supplied, limit is {max}")]
    TooManyTags { count: usize, max: usize },

    #[error("tag has {len} characters, limit is {max}")]
    TagTooLong { len: usize, max: usize },
}
