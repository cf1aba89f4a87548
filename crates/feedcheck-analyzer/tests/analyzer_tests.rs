//! End-to-end tests for the analysis orchestrator
//!
//! Every test runs against a scripted model client, so no network access is
//! needed and attempt counts are exact.

use feedcheck_analyzer::Analyzer;
use feedcheck_classifiers::testing::{Behavior, ScriptedClient};
use feedcheck_classifiers::AttemptError;
use feedcheck_core::{AnalyzerConfig, Error, InputError, Sentiment, FALLBACK_MODEL_ID};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

const QWEN: &str = "qwen/qwen3-235b-a22b-07-25:free";
const LLAMA: &str = "meta-llama/llama-3.1-8b-instruct:free";

fn config(rate_capacity: u32) -> AnalyzerConfig {
    let mut config = AnalyzerConfig::default();
    config.upstream.models = vec![QWEN.to_string(), LLAMA.to_string()];
    config.retry.max_attempts = 2;
    config.retry.base_delay_ms = 0;
    config.retry.max_delay_ms = 0;
    config.retry.jitter = 0.0;
    config.rate_gate.capacity = rate_capacity;
    config.rate_gate.window_secs = 60;
    config.rate_gate.max_wait_ms = 0;
    config
}

fn analyzer(client: &Arc<ScriptedClient>, rate_capacity: u32) -> Analyzer {
    Analyzer::with_client(&config(rate_capacity), client.clone()).unwrap()
}

fn answering() -> Arc<ScriptedClient> {
    Arc::new(ScriptedClient::new().with_model(
        QWEN,
        vec![Behavior::judge("positive", 0.92, "Product Quality", 0.81)],
    ))
}

fn tags(values: &[&str]) -> Vec<String> {
    values.iter().map(|t| t.to_string()).collect()
}

// ============================================================================
// Happy path and caching
// ============================================================================

#[tokio::test]
async fn test_model_result_is_returned() {
    let client = answering();
    let analyzer = analyzer(&client, 10);

    let result = analyzer
        .analyze("Great product, works as advertised!", &tags(&["web"]))
        .await
        .unwrap();

    assert_eq!(result.sentiment, Sentiment::Positive);
    assert_eq!(result.category, "Product Quality");
    assert_eq!(result.model_used, QWEN);
    assert!(!result.degraded);
    assert_eq!(client.calls(), 2);

    let snapshot = analyzer.metrics().snapshot();
    assert_eq!(snapshot.requests, 1);
    assert_eq!(snapshot.computations, 1);
    assert_eq!(snapshot.model_attempts, 1);
}

#[tokio::test]
async fn test_identical_text_is_served_from_cache() {
    let client = answering();
    let analyzer = analyzer(&client, 10);

    let first = analyzer.analyze("Great product!", &[]).await.unwrap();
    let second = analyzer
        .analyze("  great   PRODUCT! ", &tags(&["different", "tags"]))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(client.calls(), 2);
    assert_eq!(client.attempts(QWEN), 1);

    let snapshot = analyzer.metrics().snapshot();
    assert_eq!(snapshot.cache_hits, 1);
    assert_eq!(snapshot.computations, 1);
    assert_eq!(analyzer.cache().len(), 1);
}

#[tokio::test]
async fn test_cache_hit_bypasses_rate_gate() {
    let client = answering();
    let analyzer = analyzer(&client, 1);

    analyzer.analyze("Only once", &[]).await.unwrap();
    assert_eq!(analyzer.rate_gate().available(), 0);

    for _ in 0..5 {
        analyzer.analyze("Only once", &[]).await.unwrap();
    }
    assert_eq!(analyzer.metrics().snapshot().rate_limited, 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_identical_requests_share_one_computation() {
    let client = Arc::new(
        ScriptedClient::new()
            .with_model(QWEN, vec![Behavior::judge("negative", 0.8, "Delivery", 0.7)])
            .with_latency(Duration::from_millis(200)),
    );
    let analyzer = analyzer(&client, 10);

    let calls = (0..20).map(|_| analyzer.analyze("My parcel never arrived.", &[]));
    let results = futures::future::join_all(calls).await;

    let first = results[0].clone().unwrap();
    for result in &results {
        assert_eq!(result.as_ref().unwrap(), &first);
    }
    assert_eq!(client.attempts(QWEN), 1);
    assert_eq!(client.calls(), 2);

    let snapshot = analyzer.metrics().snapshot();
    assert_eq!(snapshot.computations, 1);
    assert_eq!(snapshot.coalesced_joins, 19);
    assert_eq!(analyzer.rate_gate().available(), 9);
}

#[tokio::test]
async fn test_analyze_request_keeps_normalized_request() {
    let client = answering();
    let analyzer = analyzer(&client, 10);

    let limits = AnalyzerConfig::default().input;
    let request = feedcheck_core::AnalysisRequest::new(
        "  Nice!  ",
        &tags(&["a", "A", " b "]),
        &limits,
    )
    .unwrap();
    let result = analyzer.analyze_request(&request).await.unwrap();

    assert_eq!(request.text(), "Nice!");
    assert_eq!(request.tags(), &["a".to_string(), "b".to_string()]);
    assert_eq!(result.model_used, QWEN);
}

#[tokio::test]
async fn test_analyze_request_enforces_analyzer_limits() {
    let client = answering();
    let analyzer = analyzer(&client, 10);

    let loose = feedcheck_core::InputLimits {
        max_text_chars: 100_000,
        ..AnalyzerConfig::default().input
    };
    let request =
        feedcheck_core::AnalysisRequest::new(&"a".repeat(20_000), &[], &loose).unwrap();

    let err = analyzer.analyze_request(&request).await.unwrap_err();
    assert_eq!(
        err,
        Error::Input(InputError::TextTooLong {
            len: 20_000,
            max: 5000
        })
    );
    assert_eq!(client.calls(), 0);
    assert!(analyzer.cache().is_empty());
    assert_eq!(analyzer.rate_gate().available(), 10);
    assert_eq!(analyzer.metrics().snapshot().input_errors, 1);
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
async fn test_capacity_plus_one_is_rate_limited() {
    let client = answering();
    let analyzer = analyzer(&client, 3);

    for text in ["first", "second", "third"] {
        analyzer.analyze(text, &[]).await.unwrap();
    }

    let err = analyzer.analyze("fourth", &[]).await.unwrap_err();
    assert!(matches!(err, Error::RateLimited { .. }));
    assert!(err.retry_after().unwrap() > Duration::ZERO);
    assert_eq!(client.calls(), 6);
    assert_eq!(analyzer.metrics().snapshot().rate_limited, 1);

    // rejections are not cached
    assert_eq!(analyzer.cache().len(), 3);
}

#[tokio::test]
async fn test_rejection_reaches_every_joined_waiter_once() {
    let client = answering();
    let analyzer = analyzer(&client, 1);
    analyzer.analyze("uses the only token", &[]).await.unwrap();

    let calls = (0..5).map(|_| analyzer.analyze("arrives too late", &[]));
    let results = futures::future::join_all(calls).await;

    for result in results {
        assert!(matches!(result, Err(Error::RateLimited { .. })));
    }
    assert_eq!(analyzer.metrics().snapshot().rate_limited, 1);
    assert_eq!(client.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rate_window_refills() {
    let client = answering();
    let analyzer = analyzer(&client, 2);

    analyzer.analyze("one", &[]).await.unwrap();
    analyzer.analyze("two", &[]).await.unwrap();
    assert!(analyzer.analyze("three", &[]).await.is_err());

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(analyzer.analyze("three", &[]).await.is_ok());
}

// ============================================================================
// Degradation
// ============================================================================

#[tokio::test]
async fn test_worst_purchase_with_every_model_down() {
    let client = Arc::new(
        ScriptedClient::new()
            .with_model(QWEN, vec![Behavior::unavailable()])
            .with_model(LLAMA, vec![Behavior::Fail(AttemptError::Transport("connection refused".into()))]),
    );

    for _ in 0..3 {
        let analyzer = analyzer(&client, 10);
        let result = analyzer
            .analyze("This is the worst purchase I've ever made.", &[])
            .await
            .unwrap();

        assert!(result.degraded);
        assert_eq!(result.sentiment, Sentiment::Negative);
        assert_eq!(result.sentiment_confidence, 0.5);
        assert_eq!(result.model_used, FALLBACK_MODEL_ID);
        assert_eq!(analyzer.metrics().snapshot().degraded_results, 1);
    }
}

#[tokio::test]
async fn test_prose_response_falls_through() {
    let client = Arc::new(
        ScriptedClient::new()
            .with_model(
                QWEN,
                vec![Behavior::Raw("I think this is: positive, fairly confident".to_string())],
            )
            .with_model(LLAMA, vec![Behavior::judge("positive", 0.7, "User Experience", 0.6)]),
    );
    let analyzer = analyzer(&client, 10);

    let result = analyzer.analyze("Smooth onboarding", &[]).await.unwrap();
    assert_eq!(result.model_used, LLAMA);
    assert!(!result.degraded);
    assert_eq!(client.attempts(QWEN), 2);

    let snapshot = analyzer.metrics().snapshot();
    assert_eq!(snapshot.failed_attempts, 2);
    assert_eq!(snapshot.model_attempts, 3);
}

#[tokio::test]
async fn test_health_reflects_client() {
    assert!(analyzer(&answering(), 1).upstream_healthy().await);
    let down = Arc::new(ScriptedClient::new().unhealthy());
    assert!(!analyzer(&down, 1).upstream_healthy().await);
}

// ============================================================================
// Input validation
// ============================================================================

#[tokio::test]
async fn test_oversized_text_rejected_before_any_work() {
    let client = answering();
    let analyzer = analyzer(&client, 10);

    let err = analyzer.analyze(&"a".repeat(5001), &[]).await.unwrap_err();
    assert_eq!(
        err,
        Error::Input(InputError::TextTooLong {
            len: 5001,
            max: 5000
        })
    );
    assert_eq!(client.calls(), 0);
    assert!(analyzer.cache().is_empty());
    assert_eq!(analyzer.rate_gate().available(), 10);

    let snapshot = analyzer.metrics().snapshot();
    assert_eq!(snapshot.input_errors, 1);
    assert_eq!(snapshot.computations, 0);

    assert!(analyzer.analyze(&"a".repeat(5000), &[]).await.is_ok());
}

#[tokio::test]
async fn test_input_errors() {
    let client = answering();
    let analyzer = analyzer(&client, 10);

    assert_eq!(
        analyzer.analyze("   \n\t ", &[]).await.unwrap_err(),
        Error::Input(InputError::EmptyText)
    );

    let many: Vec<String> = (0..11).map(|i| format!("tag{i}")).collect();
    assert!(matches!(
        analyzer.analyze("fine", &many).await,
        Err(Error::Input(InputError::TooManyTags { count: 11, max: 10 }))
    ));

    let long_tag = vec!["x".repeat(51)];
    assert!(matches!(
        analyzer.analyze("fine", &long_tag).await,
        Err(Error::Input(InputError::TagTooLong { len: 51, max: 50 }))
    ));
    assert_eq!(client.calls(), 0);
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn analyze_is_total_and_in_range(text in "\\PC{0,300}", raw in "\\PC{0,80}") {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let client = Arc::new(
            ScriptedClient::new()
                .with_model(QWEN, vec![Behavior::Raw(raw)])
                .with_model(LLAMA, vec![Behavior::unavailable()]),
        );
        let analyzer = analyzer(&client, 10_000);

        match rt.block_on(analyzer.analyze(&text, &[])) {
            Ok(result) => {
                prop_assert!((0.0..=1.0).contains(&result.sentiment_confidence));
                prop_assert!((0.0..=1.0).contains(&result.category_confidence));
                prop_assert!(matches!(
                    result.sentiment,
                    Sentiment::Positive | Sentiment::Neutral | Sentiment::Negative
                ));
            }
            Err(e) => {
                prop_assert!(e.is_input(), "unexpected error: {e}");
                prop_assert!(text.trim().is_empty());
            }
        }
    }
}
