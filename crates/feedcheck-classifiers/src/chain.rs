//! Model chain runner
//!
//! Walks the configured models in preference order. Each model gets a
//! bounded number of attempts separated by jittered exponential backoff, and
//! each attempt is bounded by its own timeout. The first valid answer wins.
//! When every model is exhausted the rule-based classifier answers, so
//! [`ModelChain::classify`] has no error path.

use crate::client::{AttemptError, ModelClient};
use crate::extract::parse_payload;
use crate::lexicon::RuleBasedClassifier;
use crate::prompt;
use crate::retry::RetryPolicy;
use crate::validator::{validate_category, validate_sentiment};
use feedcheck_core::{AnalysisResult, AttemptOutcomeKind, ModelAttempt};
use feedcheck_telemetry::MetricsCollector;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Structured result of one attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// Valid answer; ends the chain
    Success(AnalysisResult),

    /// Failed, but the same model may answer on another attempt
    Retryable(AttemptError),

    /// Failed in a way retrying this model cannot fix; move to the next model
    Terminal(AttemptError),
}

/// Ordered fallback chain over external models
pub struct ModelChain {
    client: Arc<dyn ModelClient>,
    models: Vec<String>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    fallback: RuleBasedClassifier,
    metrics: MetricsCollector,
}

impl ModelChain {
    pub fn new(
        client: Arc<dyn ModelClient>,
        models: Vec<String>,
        policy: RetryPolicy,
        attempt_timeout: Duration,
        fallback: RuleBasedClassifier,
    ) -> Self {
        Self {
            client,
            models,
            policy,
            attempt_timeout,
            fallback,
            metrics: MetricsCollector::new(),
        }
    }

    /// Report attempts to a shared collector
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn client(&self) -> &Arc<dyn ModelClient> {
        &self.client
    }

    /// Classify `text`, degrading to the rule-based classifier if no model answers
    pub async fn classify(&self, text: &str) -> AnalysisResult {
        let start = Instant::now();

        for model in &self.models {
            for attempt in 1..=self.policy.max_attempts {
                match self.attempt(model, attempt, text).await {
                    AttemptOutcome::Success(result) => {
                        info!(model = %model, attempt, "model classification succeeded");
                        return result.with_duration(start.elapsed());
                    }
                    AttemptOutcome::Retryable(_) if attempt < self.policy.max_attempts => {
                        let delay = self.policy.backoff(attempt);
                        debug!(model = %model, attempt, delay_ms = delay.as_millis() as u64, "backing off");
                        tokio::time::sleep(delay).await;
                    }
                    AttemptOutcome::Retryable(_) => {}
                    AttemptOutcome::Terminal(e) => {
                        debug!(model = %model, "skipping remaining attempts: {}", e);
                        break;
                    }
                }
            }
        }

        warn!(
            models = self.models.len(),
            "all models exhausted, using rule-based classification"
        );
        self.fallback.classify(text).with_duration(start.elapsed())
    }

    /// Run one bounded attempt against `model`
    pub async fn attempt(&self, model: &str, attempt_number: u32, text: &str) -> AttemptOutcome {
        let started = Instant::now();

        let result = match tokio::time::timeout(self.attempt_timeout, self.judge(model, text)).await
        {
            Ok(result) => result,
            Err(_) => Err(AttemptError::Timeout),
        };

        let record = ModelAttempt {
            model_id: model.to_string(),
            attempt_number,
            outcome: result
                .as_ref()
                .map_or_else(AttemptError::outcome, |_| AttemptOutcomeKind::Success),
            latency: started.elapsed(),
        };
        self.metrics.record_attempt(&record);

        match result {
            Ok(result) => AttemptOutcome::Success(result),
            Err(e) => {
                warn!(
                    model = %record.model_id,
                    attempt = record.attempt_number,
                    outcome = record.outcome.as_str(),
                    latency_ms = record.latency.as_millis() as u64,
                    "model attempt failed: {}",
                    e
                );
                if e.is_retryable() {
                    AttemptOutcome::Retryable(e)
                } else {
                    AttemptOutcome::Terminal(e)
                }
            }
        }
    }

    /// Ask `model` for both dimensions concurrently and validate the answers
    async fn judge(&self, model: &str, text: &str) -> Result<AnalysisResult, AttemptError> {
        let sentiment_prompt = prompt::sentiment(text);
        let category_prompt = prompt::category(text);

        let (sentiment_raw, category_raw) = futures::try_join!(
            self.client.complete(model, &sentiment_prompt),
            self.client.complete(model, &category_prompt),
        )?;

        let sentiment = validate_sentiment(&parse_payload(&sentiment_raw)?)?;
        let category = validate_category(&parse_payload(&category_raw)?)?;

        Ok(AnalysisResult::from_model(
            model,
            sentiment.sentiment,
            sentiment.confidence,
            category.category,
            category.confidence,
        ))
    }
}
