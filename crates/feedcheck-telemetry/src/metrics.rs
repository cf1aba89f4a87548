//! Metrics collection and reporting

use feedcheck_core::{AnalysisResult, AttemptOutcomeKind, ModelAttempt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics collector for the analysis pipeline
///
/// Cheap to clone; all clones share the same counters.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    requests: AtomicU64,
    input_errors: AtomicU64,
    cache_hits: AtomicU64,
    coalesced_joins: AtomicU64,
    computations: AtomicU64,
    rate_limited: AtomicU64,
    model_attempts: AtomicU64,
    failed_attempts: AtomicU64,
    degraded_results: AtomicU64,
    total_latency_ms: AtomicU64,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    /// Register metric descriptions with the installed recorder
    pub fn describe() {
        metrics::describe_counter!("feedcheck_requests_total", "Analyze calls received");
        metrics::describe_counter!(
            "feedcheck_input_errors_total",
            "Analyze calls rejected by input validation"
        );
        metrics::describe_counter!("feedcheck_cache_hits_total", "Results served from cache");
        metrics::describe_counter!(
            "feedcheck_coalesced_total",
            "Callers that joined an in-flight computation"
        );
        metrics::describe_counter!(
            "feedcheck_computations_total",
            "Classification pipelines started"
        );
        metrics::describe_counter!(
            "feedcheck_rate_limited_total",
            "Computations refused by the rate gate"
        );
        metrics::describe_counter!(
            "feedcheck_model_attempts_total",
            "External model attempts by model and outcome"
        );
        metrics::describe_counter!(
            "feedcheck_degraded_total",
            "Results produced by the rule-based fallback"
        );
        metrics::describe_histogram!(
            "feedcheck_analysis_duration_ms",
            metrics::Unit::Milliseconds,
            "Time spent producing a fresh result"
        );
    }

    /// Record an incoming analyze call
    pub fn record_request(&self) {
        self.inner.requests.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("feedcheck_requests_total").increment(1);
    }

    /// Record an input validation rejection
    pub fn record_input_error(&self) {
        self.inner.input_errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("feedcheck_input_errors_total").increment(1);
    }

    /// Record a cache hit
    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("feedcheck_cache_hits_total").increment(1);
    }

    /// Record a caller joining an in-flight computation
    pub fn record_coalesced(&self) {
        self.inner.coalesced_joins.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("feedcheck_coalesced_total").increment(1);
    }

    /// Record the start of a classification pipeline
    pub fn record_computation(&self) {
        self.inner.computations.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("feedcheck_computations_total").increment(1);
    }

    /// Record a rate gate rejection
    pub fn record_rate_limited(&self) {
        self.inner.rate_limited.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("feedcheck_rate_limited_total").increment(1);
    }

    /// Record one model attempt
    pub fn record_attempt(&self, attempt: &ModelAttempt) {
        self.inner.model_attempts.fetch_add(1, Ordering::Relaxed);
        if attempt.outcome != AttemptOutcomeKind::Success {
            self.inner.failed_attempts.fetch_add(1, Ordering::Relaxed);
        }
        metrics::counter!(
            "feedcheck_model_attempts_total",
            "model" => attempt.model_id.clone(),
            "outcome" => attempt.outcome.as_str()
        )
        .increment(1);
    }

    /// Record a freshly computed result
    pub fn record_result(&self, result: &AnalysisResult) {
        let ms = result.duration.as_millis() as u64;
        self.inner.total_latency_ms.fetch_add(ms, Ordering::Relaxed);
        if result.degraded {
            self.inner.degraded_results.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("feedcheck_degraded_total").increment(1);
        }
        metrics::histogram!("feedcheck_analysis_duration_ms").record(ms as f64);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let i = &self.inner;
        MetricsSnapshot {
            requests: i.requests.load(Ordering::Relaxed),
            input_errors: i.input_errors.load(Ordering::Relaxed),
            cache_hits: i.cache_hits.load(Ordering::Relaxed),
            coalesced_joins: i.coalesced_joins.load(Ordering::Relaxed),
            computations: i.computations.load(Ordering::Relaxed),
            rate_limited: i.rate_limited.load(Ordering::Relaxed),
            model_attempts: i.model_attempts.load(Ordering::Relaxed),
            failed_attempts: i.failed_attempts.load(Ordering::Relaxed),
            degraded_results: i.degraded_results.load(Ordering::Relaxed),
            total_latency_ms: i.total_latency_ms.load(Ordering::Relaxed),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub input_errors: u64,
    pub cache_hits: u64,
    pub coalesced_joins: u64,
    pub computations: u64,
    pub rate_limited: u64,
    pub model_attempts: u64,
    pub failed_attempts: u64,
    pub degraded_results: u64,
    pub total_latency_ms: u64,
}

impl MetricsSnapshot {
    /// Average latency per fresh computation
    pub fn avg_latency_ms(&self) -> u64 {
        if self.computations == 0 {
            0
        } else {
            self.total_latency_ms / self.computations
        }
    }

    /// Share of requests served without a new computation
    pub fn hit_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            (self.cache_hits + self.coalesced_joins) as f64 / self.requests as f64
        }
    }
}
