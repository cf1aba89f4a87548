//! feedcheck Core
//!
//! Core types, traits, and utilities shared across feedcheck components.
//!
//! This crate provides:
//! - The feedback analysis data model (requests, fingerprints, results)
//! - Input validation limits applied before any cache or network work
//! - Error types and result handling
//! - Layered configuration loading (defaults, YAML file, environment)

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    AnalyzerConfig, CacheConfig, InputLimits, RateGateConfig, RetryConfig, UpstreamConfig,
};
pub use error::{Error, InputError, Result};
pub use types::{
    AnalysisRequest, AnalysisResult, AttemptOutcomeKind, Fingerprint, ModelAttempt, Sentiment,
    FALLBACK_MODEL_ID,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::AnalyzerConfig;
    pub use crate::error::{Error, InputError, Result};
    pub use crate::types::{AnalysisRequest, AnalysisResult, Fingerprint, Sentiment};
}
