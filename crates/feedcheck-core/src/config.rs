//! Analyzer configuration
//!
//! Loaded in three layers: built-in defaults, an optional YAML file
//! (`feedcheck.yaml` in the working directory unless a path is given), then
//! `FEEDCHECK_`-prefixed environment variables (`__` separates sections, e.g.
//! `FEEDCHECK_RATE_GATE__CAPACITY=50`). The upstream credential may also come
//! from `OPENROUTER_API_KEY`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "FEEDCHECK";

/// Configuration file looked up in the working directory when none is given
pub const DEFAULT_FILE: &str = "feedcheck";

/// Fallback environment variable for the upstream credential
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Complete analyzer configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub rate_gate: RateGateConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub input: InputLimits,
}

impl AnalyzerConfig {
    /// Load configuration from defaults, an optional YAML file, and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        builder = match path {
            Some(path) => builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            ),
            None => builder.add_source(
                config::File::new(DEFAULT_FILE, config::FileFormat::Yaml).required(false),
            ),
        };

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("upstream.models")
                .try_parsing(true),
        );

        let mut config: Self = builder.build()?.try_deserialize()?;

        if config.upstream.api_key.is_none() {
            config.upstream.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        }

        config.validate()?;
        tracing::debug!(
            models = config.upstream.models.len(),
            "analyzer configuration loaded"
        );
        Ok(config)
    }

    /// Reject values no component can run with
    pub fn validate(&self) -> Result<()> {
        if self.upstream.models.iter().any(|m| m.trim().is_empty()) {
            return Err(Error::config("upstream.models contains an empty model id"));
        }
        if !(0.0..=2.0).contains(&self.upstream.temperature) {
            return Err(Error::config("upstream.temperature must be within [0, 2]"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config("retry.max_attempts must be at least 1"));
        }
        if self.retry.attempt_timeout_ms == 0 {
            return Err(Error::config("retry.attempt_timeout_ms must be positive"));
        }
        if self.retry.multiplier < 1.0 {
            return Err(Error::config("retry.multiplier must be at least 1.0"));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(Error::config("retry.jitter must be within [0, 1]"));
        }
        if self.rate_gate.capacity == 0 || self.rate_gate.window_secs == 0 {
            return Err(Error::config(
                "rate_gate.capacity and rate_gate.window_secs must be positive",
            ));
        }
        if self.cache.capacity == 0 {
            return Err(Error::config("cache.capacity must be positive"));
        }
        if self.input.max_text_chars == 0 {
            return Err(Error::config("input.max_text_chars must be positive"));
        }
        Ok(())
    }

    /// Copy with the credential masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.upstream.api_key.is_some() {
            copy.upstream.api_key = Some("***".to_string());
        }
        copy
    }
}

/// Upstream classification API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Bearer credential
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sent as `HTTP-Referer`
    #[serde(default = "default_app_url")]
    pub app_url: String,

    /// Sent as `X-Title`
    #[serde(default = "default_app_title")]
    pub app_title: String,

    /// Ordered model preference, primary first
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,
}

impl UpstreamConfig {
    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            app_url: default_app_url(),
            app_title: default_app_title(),
            models: default_models(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            health_timeout_ms: default_health_timeout_ms(),
        }
    }
}

/// Per-model retry and backoff settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per model
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Upper bound on a single external call
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Fraction of the computed delay randomly added or removed
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl RetryConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

/// Admission control settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateGateConfig {
    /// Admissions per window
    #[serde(default = "default_rate_capacity")]
    pub capacity: u32,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// How long `admit` may wait for a token before rejecting
    #[serde(default)]
    pub max_wait_ms: u64,
}

impl RateGateConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

impl Default for RateGateConfig {
    fn default() -> Self {
        Self {
            capacity: default_rate_capacity(),
            window_secs: default_window_secs(),
            max_wait_ms: 0,
        }
    }
}

/// Result cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            capacity: default_cache_capacity(),
        }
    }
}

/// Input validation limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputLimits {
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    #[serde(default = "default_max_tags")]
    pub max_tags: usize,

    #[serde(default = "default_max_tag_chars")]
    pub max_tag_chars: usize,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_text_chars: default_max_text_chars(),
            max_tags: default_max_tags(),
            max_tag_chars: default_max_tag_chars(),
        }
    }
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_app_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_app_title() -> String {
    "AI Feedback Analyzer".to_string()
}

fn default_models() -> Vec<String> {
    vec![
        "qwen/qwen3-235b-a22b-07-25:free".to_string(),
        "meta-llama/llama-3.1-8b-instruct:free".to_string(),
    ]
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    200
}

fn default_health_timeout_ms() -> u64 {
    5_000
}

fn default_max_attempts() -> u32 {
    2
}

fn default_attempt_timeout_ms() -> u64 {
    30_000
}

fn default_base_delay_ms() -> u64 {
    250
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    4_000
}

fn default_jitter() -> f64 {
    0.2
}

fn default_rate_capacity() -> u32 {
    100
}

fn default_window_secs() -> u64 {
    60
}

fn default_ttl_secs() -> u64 {
    600
}

fn default_cache_capacity() -> usize {
    1024
}

fn default_max_text_chars() -> usize {
    5000
}

fn default_max_tags() -> usize {
    10
}

fn default_max_tag_chars() -> usize {
    50
}
