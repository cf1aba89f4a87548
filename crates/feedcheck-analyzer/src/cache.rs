//! Fingerprint-keyed result cache with single-flight coalescing
//!
//! At most one computation runs per fingerprint. The first caller for a
//! missing key spawns it as a background task and registers a shared handle;
//! later callers await the same handle. The task owns the cache write, so a
//! caller dropping its future never cancels work other callers are waiting
//! on. Errors reach every waiter and are never stored.

use feedcheck_core::{AnalysisResult, CacheConfig, Error, Fingerprint, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error};

type Flight = Shared<BoxFuture<'static, Result<AnalysisResult>>>;

/// How [`ResultCache::get_or_compute`] obtained its result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Served from a live entry
    Hit,
    /// Joined a computation started by another caller
    Joined,
    /// Started the computation
    Computed,
}

struct Entry {
    result: AnalysisResult,
    expires_at: Instant,
    last_used: u64,
}

struct InFlight {
    id: u64,
    flight: Flight,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<Fingerprint, Entry>,
    inflight: HashMap<Fingerprint, InFlight>,
    clock: u64,
    next_flight: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn live(&mut self, key: &Fingerprint, now: Instant) -> Option<AnalysisResult> {
        let tick = self.tick();
        match self.entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.last_used = tick;
                Some(entry.result.clone())
            }
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            debug!(fingerprint = key.short(), "evicting least recently used result");
            self.entries.remove(&key);
        }
    }
}

struct CacheInner {
    state: Mutex<CacheState>,
    ttl: Duration,
    capacity: usize,
}

impl CacheInner {
    fn store(&self, key: Fingerprint, result: AnalysisResult) {
        let now = Instant::now();
        let mut state = self.state.lock();
        if !state.entries.contains_key(&key) && state.entries.len() >= self.capacity {
            state.purge_expired(now);
            while state.entries.len() >= self.capacity {
                state.evict_lru();
            }
        }
        let last_used = state.tick();
        state.entries.insert(
            key,
            Entry {
                result,
                expires_at: now + self.ttl,
                last_used,
            },
        );
    }
}

/// Deregisters a flight when its task ends, including by panic
struct FlightGuard {
    inner: Arc<CacheInner>,
    key: Fingerprint,
    id: u64,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        if state.inflight.get(&self.key).is_some_and(|f| f.id == self.id) {
            state.inflight.remove(&self.key);
        }
    }
}

/// Bounded TTL cache of analysis results
///
/// Cheap to clone; all clones share the same entries.
#[derive(Clone)]
pub struct ResultCache {
    inner: Arc<CacheInner>,
}

impl ResultCache {
    /// Cache holding at most `capacity` results for `ttl` each
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState::default()),
                ttl,
                capacity: capacity.max(1),
            }),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.capacity)
    }

    /// Live entry for `key`, if any
    pub fn get(&self, key: &Fingerprint) -> Option<AnalysisResult> {
        self.inner.state.lock().live(key, Instant::now())
    }

    /// Store `result` under `key`, evicting as needed
    pub fn insert(&self, key: Fingerprint, result: AnalysisResult) {
        self.inner.store(key, result);
    }

    /// Serve `key` from cache, join its in-flight computation, or start one
    ///
    /// `compute` runs on a spawned task at most once per flight. An `Ok`
    /// result is cached before the flight is deregistered.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &Fingerprint,
        compute: F,
    ) -> (Result<AnalysisResult>, Lookup)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<AnalysisResult>> + Send + 'static,
    {
        let (flight, lookup) = {
            let mut state = self.inner.state.lock();
            if let Some(result) = state.live(key, Instant::now()) {
                return (Ok(result), Lookup::Hit);
            }

            if let Some(existing) = state.inflight.get(key) {
                (existing.flight.clone(), Lookup::Joined)
            } else {
                state.next_flight += 1;
                let guard = FlightGuard {
                    inner: Arc::clone(&self.inner),
                    key: key.clone(),
                    id: state.next_flight,
                };

                let task = tokio::spawn(async move {
                    let result = compute().await;
                    if let Ok(result) = &result {
                        guard.inner.store(guard.key.clone(), result.clone());
                    }
                    drop(guard);
                    result
                });

                let flight = async move {
                    task.await.unwrap_or_else(|e| {
                        error!("analysis task failed: {}", e);
                        Err(Error::internal(format!("analysis task failed: {e}")))
                    })
                }
                .boxed()
                .shared();

                let id = state.next_flight;
                state.inflight.insert(
                    key.clone(),
                    InFlight {
                        id,
                        flight: flight.clone(),
                    },
                );
                (flight, Lookup::Computed)
            }
        };

        (flight.await, lookup)
    }

    /// Drop expired entries; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        self.inner.state.lock().purge_expired(Instant::now())
    }

    /// Stored entries, expired ones included until purged
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Computations currently running
    pub fn inflight(&self) -> usize {
        self.inner.state.lock().inflight.len()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedcheck_core::Sentiment;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn result(model: &str) -> AnalysisResult {
        AnalysisResult::from_model(model, Sentiment::Positive, 0.9, "Pricing", 0.8)
    }

    fn key(text: &str) -> Fingerprint {
        Fingerprint::of(text)
    }

    async fn explode() -> Result<AnalysisResult> {
        panic!("classifier bug")
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = ResultCache::new(Duration::from_secs(60), 8);
        let (first, lookup) = cache
            .get_or_compute(&key("a"), || async { Ok(result("m1")) })
            .await;
        assert_eq!(lookup, Lookup::Computed);
        assert_eq!(first.unwrap().model_used, "m1");

        let (second, lookup) = cache
            .get_or_compute(&key("a"), || async { Ok(result("m2")) })
            .await;
        assert_eq!(lookup, Lookup::Hit);
        assert_eq!(second.unwrap().model_used, "m1");
        assert_eq!(cache.inflight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_computation() {
        let cache = ResultCache::new(Duration::from_secs(60), 8);
        let runs = Arc::new(AtomicU32::new(0));

        let callers: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                let runs = Arc::clone(&runs);
                tokio::spawn(async move {
                    cache
                        .get_or_compute(&key("same"), move || async move {
                            runs.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_secs(1)).await;
                            Ok(result("shared"))
                        })
                        .await
                })
            })
            .collect();

        let mut computed = 0;
        for caller in callers {
            let (result, lookup) = caller.await.unwrap();
            assert_eq!(result.unwrap().model_used, "shared");
            if lookup == Lookup::Computed {
                computed += 1;
            }
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(computed, 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_caller_does_not_cancel_flight() {
        let cache = ResultCache::new(Duration::from_secs(60), 8);
        let runs = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&runs);
        let slow_key = key("slow");
        let first = cache.get_or_compute(&slow_key, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(result("finished"))
        });
        assert!(tokio::time::timeout(Duration::from_secs(1), first).await.is_err());
        assert_eq!(cache.inflight(), 1);

        let (joined, lookup) = cache
            .get_or_compute(&key("slow"), || async { Ok(result("duplicate")) })
            .await;
        assert_eq!(lookup, Lookup::Joined);
        assert_eq!(joined.unwrap().model_used, "finished");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_propagate_and_are_not_cached() {
        let cache = ResultCache::new(Duration::from_secs(60), 8);
        let (err, _) = cache
            .get_or_compute(&key("x"), || async {
                Err(Error::rate_limited(Duration::from_secs(3)))
            })
            .await;
        assert_eq!(err.unwrap_err().retry_after(), Some(Duration::from_secs(3)));
        assert!(cache.is_empty());
        assert_eq!(cache.inflight(), 0);

        let (ok, lookup) = cache
            .get_or_compute(&key("x"), || async { Ok(result("retry")) })
            .await;
        assert_eq!(lookup, Lookup::Computed);
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_panicking_computation_is_internal_error() {
        let cache = ResultCache::new(Duration::from_secs(60), 8);
        let (err, _) = cache
            .get_or_compute(&key("boom"), explode)
            .await;
        assert!(matches!(err, Err(Error::Internal(_))));
        assert_eq!(cache.inflight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let cache = ResultCache::new(Duration::from_secs(10), 8);
        cache.insert(key("t"), result("old"));
        assert!(cache.get(&key("t")).is_some());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cache.get(&key("t")).is_none());

        cache.insert(key("u"), result("old"));
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = ResultCache::new(Duration::from_secs(60), 2);
        cache.insert(key("a"), result("a"));
        cache.insert(key("b"), result("b"));
        assert!(cache.get(&key("a")).is_some());

        cache.insert(key("c"), result("c"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("a")).is_some());
        assert!(cache.get(&key("b")).is_none());
        assert!(cache.get(&key("c")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_go_before_live_ones() {
        let cache = ResultCache::new(Duration::from_secs(10), 2);
        cache.insert(key("stale"), result("stale"));
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.insert(key("fresh"), result("fresh"));
        tokio::time::advance(Duration::from_secs(6)).await;

        // "stale" has expired; purging it makes room without evicting "fresh"
        cache.insert(key("new"), result("new"));
        assert!(cache.get(&key("fresh")).is_some());
        assert!(cache.get(&key("new")).is_some());
    }
}
