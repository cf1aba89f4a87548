//! Feedback analysis orchestrator
//!
//! ```text
//! validate -> cache lookup -> hit: done
//!                          -> joined: await the in-flight result
//!                          -> miss: rate gate -> model chain -> cache write
//! ```
//!
//! Input validation runs before any shared state is touched. Once the rate
//! gate admits a computation the model chain always yields a result.

use crate::cache::{Lookup, ResultCache};
use crate::rate_gate::RateGate;
use feedcheck_classifiers::{
    ModelChain, ModelClient, OpenRouterClient, RetryPolicy, RuleBasedClassifier,
};
use feedcheck_core::{AnalysisRequest, AnalysisResult, AnalyzerConfig, InputLimits, Result};
use feedcheck_telemetry::MetricsCollector;
use std::sync::Arc;
use tracing::{debug, info, warn};

struct AnalyzerInner {
    chain: ModelChain,
    gate: RateGate,
    cache: ResultCache,
    limits: InputLimits,
    metrics: MetricsCollector,
}

impl AnalyzerInner {
    /// Rate gate plus model chain; runs once per flight
    async fn compute(&self, request: AnalysisRequest) -> Result<AnalysisResult> {
        let fingerprint = request.fingerprint().short().to_string();

        match self.gate.admit().await {
            Ok(permit) => debug!(
                fingerprint = %fingerprint,
                waited_ms = permit.waited().as_millis() as u64,
                "admitted"
            ),
            Err(e) => {
                self.metrics.record_rate_limited();
                warn!(fingerprint = %fingerprint, "analysis rejected: {}", e);
                return Err(e);
            }
        }
        self.metrics.record_computation();

        let result = self.chain.classify(request.text()).await;
        self.metrics.record_result(&result);

        info!(
            fingerprint = %fingerprint,
            sentiment = %result.sentiment,
            category = %result.category,
            model = %result.model_used,
            degraded = result.degraded,
            duration_ms = result.duration.as_millis() as u64,
            tags = request.tags().len(),
            "analysis complete"
        );
        Ok(result)
    }
}

/// Feedback analysis service
///
/// Cheap to clone; clones share the cache, rate gate, and metrics.
#[derive(Clone)]
pub struct Analyzer {
    inner: Arc<AnalyzerInner>,
}

impl Analyzer {
    /// Assemble an analyzer from explicit parts
    pub fn new(
        chain: ModelChain,
        gate: RateGate,
        cache: ResultCache,
        limits: InputLimits,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            inner: Arc::new(AnalyzerInner {
                chain,
                gate,
                cache,
                limits,
                metrics,
            }),
        }
    }

    /// Analyzer backed by the OpenRouter API
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self> {
        let client = OpenRouterClient::new(&config.upstream)?;
        Self::with_client(config, Arc::new(client))
    }

    /// Analyzer over any model client, configured from `config`
    pub fn with_client(config: &AnalyzerConfig, client: Arc<dyn ModelClient>) -> Result<Self> {
        let metrics = MetricsCollector::new();
        let chain = ModelChain::new(
            client,
            config.upstream.models.clone(),
            RetryPolicy::from(&config.retry),
            config.retry.attempt_timeout(),
            RuleBasedClassifier::new()?,
        )
        .with_metrics(metrics.clone());

        info!(
            models = ?config.upstream.models,
            rate_capacity = config.rate_gate.capacity,
            rate_window_secs = config.rate_gate.window_secs,
            cache_capacity = config.cache.capacity,
            cache_ttl_secs = config.cache.ttl_secs,
            "analyzer configured"
        );

        Ok(Self::new(
            chain,
            RateGate::from_config(&config.rate_gate),
            ResultCache::from_config(&config.cache),
            config.input.clone(),
            metrics,
        ))
    }

    /// Analyze raw feedback text
    ///
    /// Fails only with [`feedcheck_core::Error::Input`] or
    /// [`feedcheck_core::Error::RateLimited`].
    pub async fn analyze(&self, text: &str, tags: &[String]) -> Result<AnalysisResult> {
        self.inner.metrics.record_request();

        let request = match AnalysisRequest::new(text, tags, &self.inner.limits) {
            Ok(request) => request,
            Err(e) => {
                self.inner.metrics.record_input_error();
                debug!("rejected input: {}", e);
                return Err(e.into());
            }
        };

        self.run(request).await
    }

    /// Analyze a request built by the caller
    ///
    /// Lets the caller keep the normalized request alongside the result. The
    /// request is checked again against this analyzer's input limits, since
    /// it may have been built with looser ones.
    pub async fn analyze_request(&self, request: &AnalysisRequest) -> Result<AnalysisResult> {
        self.analyze(request.text(), request.tags()).await
    }

    async fn run(&self, request: AnalysisRequest) -> Result<AnalysisResult> {
        let fingerprint = request.fingerprint().clone();
        debug!(
            fingerprint = fingerprint.short(),
            preview = %request.preview(),
            "analyzing feedback"
        );

        let inner = Arc::clone(&self.inner);
        let (result, lookup) = self
            .inner
            .cache
            .get_or_compute(&fingerprint, move || async move { inner.compute(request).await })
            .await;

        match lookup {
            Lookup::Hit => {
                self.inner.metrics.record_cache_hit();
                debug!(fingerprint = fingerprint.short(), "cache hit");
            }
            Lookup::Joined => {
                self.inner.metrics.record_coalesced();
                debug!(fingerprint = fingerprint.short(), "joined in-flight analysis");
            }
            Lookup::Computed => {}
        }

        result
    }

    /// Whether the upstream model service is reachable
    pub async fn upstream_healthy(&self) -> bool {
        self.inner.chain.client().check_health().await
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.inner.metrics
    }

    pub fn cache(&self) -> &ResultCache {
        &self.inner.cache
    }

    pub fn rate_gate(&self) -> &RateGate {
        &self.inner.gate
    }

    pub fn models(&self) -> &[String] {
        self.inner.chain.models()
    }
}
