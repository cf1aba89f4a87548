//! Core types for feedcheck

use crate::config::InputLimits;
use crate::error::InputError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// `model_used` value for results produced by the rule-based fallback
pub const FALLBACK_MODEL_ID: &str = "rule-based-fallback";

/// Sentiment label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "neutral" => Ok(Self::Neutral),
            "negative" => Ok(Self::Negative),
            other => Err(format!("unknown sentiment '{other}'")),
        }
    }
}

/// Deterministic hash of normalized feedback text
///
/// Normalization trims, collapses whitespace runs to a single space, and
/// lowercases. Tags never contribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint the given feedback text
    pub fn of(text: &str) -> Self {
        let normalized = normalize(text);
        Self(format!("{:x}", Sha256::digest(normalized.as_bytes())))
    }

    /// Hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A validated request to analyze one piece of feedback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisRequest {
    text: String,
    tags: Vec<String>,
    fingerprint: Fingerprint,
}

impl AnalysisRequest {
    /// Validate and normalize raw input
    ///
    /// The text is trimmed and must be non-empty and at most
    /// `limits.max_text_chars` characters. Tags are trimmed, empty tags are
    /// dropped and duplicates (Unicode case-insensitive) removed, keeping the first
    /// occurrence; the remaining count and every tag length must be in bounds.
    pub fn new(
        text: &str,
        tags: &[String],
        limits: &InputLimits,
    ) -> std::result::Result<Self, InputError> {
        let len = text.chars().count();
        if len > limits.max_text_chars {
            return Err(InputError::TextTooLong {
                len,
                max: limits.max_text_chars,
            });
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(InputError::EmptyText);
        }

        let mut cleaned: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            let tag_len = tag.chars().count();
            if tag_len > limits.max_tag_chars {
                return Err(InputError::TagTooLong {
                    len: tag_len,
                    max: limits.max_tag_chars,
                });
            }
            let folded = tag.to_lowercase();
            if !cleaned.iter().any(|seen| seen.to_lowercase() == folded) {
                cleaned.push(tag.to_string());
            }
        }
        if cleaned.len() > limits.max_tags {
            return Err(InputError::TooManyTags {
                count: cleaned.len(),
                max: limits.max_tags,
            });
        }

        Ok(Self {
            fingerprint: Fingerprint::of(text),
            text: text.to_string(),
            tags: cleaned,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// At most 100 characters of the text, for log lines
    pub fn preview(&self) -> String {
        self.text.chars().take(100).collect()
    }
}

/// How a single model attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcomeKind {
    Success,
    Timeout,
    TransportError,
    InvalidResponse,
}

impl AttemptOutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Timeout => "timeout",
            Self::TransportError => "transport_error",
            Self::InvalidResponse => "invalid_response",
        }
    }
}

/// Record of one classification attempt against one model
///
/// Logged and counted, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAttempt {
    pub model_id: String,
    pub attempt_number: u32,
    pub outcome: AttemptOutcomeKind,
    pub latency: Duration,
}

/// Validated sentiment/category judgment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub sentiment: Sentiment,

    /// Always within [0.0, 1.0]
    pub sentiment_confidence: f32,

    pub category: String,

    /// Always within [0.0, 1.0]
    pub category_confidence: f32,

    /// Model that produced the result, or [`FALLBACK_MODEL_ID`]
    pub model_used: String,

    /// True iff produced by the rule-based fallback
    pub degraded: bool,

    /// Wall-clock time spent producing the result
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
}

impl AnalysisResult {
    /// Result produced by an external model
    pub fn from_model(
        model: impl Into<String>,
        sentiment: Sentiment,
        sentiment_confidence: f32,
        category: impl Into<String>,
        category_confidence: f32,
    ) -> Self {
        Self {
            sentiment,
            sentiment_confidence: clamp_unit(sentiment_confidence),
            category: category.into(),
            category_confidence: clamp_unit(category_confidence),
            model_used: model.into(),
            degraded: false,
            duration: Duration::ZERO,
        }
    }

    /// Result produced by the rule-based fallback
    pub fn fallback(
        sentiment: Sentiment,
        sentiment_confidence: f32,
        category: impl Into<String>,
        category_confidence: f32,
    ) -> Self {
        let mut result = Self::from_model(
            FALLBACK_MODEL_ID,
            sentiment,
            sentiment_confidence,
            category,
            category_confidence,
        );
        result.degraded = true;
        result
    }

    /// Set the wall-clock duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
