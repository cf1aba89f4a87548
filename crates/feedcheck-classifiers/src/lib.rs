//! feedcheck Classifiers
//!
//! Turns feedback text into a validated sentiment/category judgment.
//!
//! A [`ModelChain`] walks an ordered list of external models, retrying each
//! with exponential backoff and a per-attempt timeout. Every response is
//! parsed strictly, then by best-effort extraction, and checked by the
//! response validator. When every model is exhausted the deterministic
//! [`RuleBasedClassifier`] answers, so classification never fails.

pub mod chain;
pub mod client;
pub mod extract;
pub mod lexicon;
pub mod openrouter;
pub mod prompt;
pub mod retry;
pub mod validator;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use chain::{AttemptOutcome, ModelChain};
pub use client::{AttemptError, ModelClient, Prompt, PromptKind};
pub use lexicon::RuleBasedClassifier;
pub use openrouter::OpenRouterClient;
pub use retry::RetryPolicy;
pub use validator::{CategoryJudgment, SentimentJudgment, ValidationError};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::chain::ModelChain;
    pub use crate::client::{AttemptError, ModelClient, Prompt, PromptKind};
    pub use crate::lexicon::RuleBasedClassifier;
    pub use crate::openrouter::OpenRouterClient;
    pub use crate::retry::RetryPolicy;
}
