//! Scripted model client for tests
//!
//! Replays a per-model sequence of behaviors. One behavior covers one
//! attempt: the sentiment call advances the sequence and the category call of
//! the same attempt reuses it. The last behavior repeats once the sequence is
//! exhausted; unknown models answer 503.

use crate::client::{AttemptError, ModelClient, Prompt, PromptKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// What one scripted attempt does
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Well-formed JSON for both dimensions
    Judge {
        sentiment: String,
        sentiment_confidence: f64,
        category: String,
        category_confidence: f64,
    },
    /// The same raw content for both dimensions
    Raw(String),
    /// Fail the call
    Fail(AttemptError),
    /// Never answer; only the attempt timeout ends it
    Hang,
}

impl Behavior {
    pub fn judge(sentiment: &str, confidence: f64, category: &str, category_confidence: f64) -> Self {
        Self::Judge {
            sentiment: sentiment.to_string(),
            sentiment_confidence: confidence,
            category: category.to_string(),
            category_confidence,
        }
    }

    pub fn unavailable() -> Self {
        Self::Fail(AttemptError::status(503, "service unavailable"))
    }
}

#[derive(Default)]
struct Script {
    steps: Vec<Behavior>,
    attempts: usize,
}

/// A [`ModelClient`] that replays scripted behaviors
#[derive(Default)]
pub struct ScriptedClient {
    scripts: Mutex<HashMap<String, Script>>,
    latency: Option<Duration>,
    healthy: bool,
    calls: AtomicU32,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            healthy: true,
            ..Default::default()
        }
    }

    /// Script `model` with a sequence of attempt behaviors
    pub fn with_model(self, model: &str, steps: Vec<Behavior>) -> Self {
        self.scripts.lock().insert(
            model.to_string(),
            Script {
                steps,
                attempts: 0,
            },
        );
        self
    }

    /// Delay every answer by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Report the upstream as unreachable
    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// Total `complete` calls, both dimensions included
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Attempts started against `model`
    pub fn attempts(&self, model: &str) -> usize {
        self.scripts
            .lock()
            .get(model)
            .map_or(0, |script| script.attempts)
    }

    fn behavior(&self, model: &str, kind: PromptKind) -> Behavior {
        let mut scripts = self.scripts.lock();
        let Some(script) = scripts.get_mut(model) else {
            return Behavior::unavailable();
        };
        if kind == PromptKind::Sentiment {
            script.attempts += 1;
        }
        let index = script.attempts.saturating_sub(1);
        script
            .steps
            .get(index)
            .or_else(|| script.steps.last())
            .cloned()
            .unwrap_or_else(Behavior::unavailable)
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn complete(&self, model: &str, prompt: &Prompt) -> Result<String, AttemptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior(model, prompt.kind);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match behavior {
            Behavior::Judge {
                sentiment,
                sentiment_confidence,
                category,
                category_confidence,
            } => Ok(match prompt.kind {
                PromptKind::Sentiment => serde_json::json!({
                    "sentiment": sentiment,
                    "confidence": sentiment_confidence,
                    "reasoning": "scripted",
                }),
                PromptKind::Category => serde_json::json!({
                    "category": category,
                    "confidence": category_confidence,
                    "reasoning": "scripted",
                }),
            }
            .to_string()),
            Behavior::Raw(content) => Ok(content),
            Behavior::Fail(e) => Err(e),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                Err(AttemptError::Timeout)
            }
        }
    }

    async fn check_health(&self) -> bool {
        self.healthy
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
