//! Admission control for the upstream service
//!
//! A single token bucket shared by every computation. It starts full with
//! `capacity` tokens and refills `capacity` tokens per window. Callers wait
//! for a token only when it will arrive within `max_wait`; otherwise they are
//! rejected with the time until the next token.

use feedcheck_core::{Error, RateGateConfig, Result};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Proof of admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Permit {
    waited: Duration,
}

impl Permit {
    /// Time spent queued before admission
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

/// Process-wide token bucket
#[derive(Debug)]
pub struct RateGate {
    bucket: Mutex<Bucket>,
    capacity: f64,
    refill_per_sec: f64,
    max_wait: Duration,
}

impl RateGate {
    pub fn new(capacity: u32, window: Duration, max_wait: Duration) -> Self {
        let capacity = f64::from(capacity.max(1));
        let window = window.as_secs_f64().max(1e-3);
        Self {
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_per_sec: capacity / window,
            max_wait,
        }
    }

    pub fn from_config(config: &RateGateConfig) -> Self {
        Self::new(config.capacity, config.window(), config.max_wait())
    }

    /// Take one token, waiting up to `max_wait` for it
    pub async fn admit(&self) -> Result<Permit> {
        let start = Instant::now();
        loop {
            let wait = match self.try_take() {
                Ok(()) => {
                    return Ok(Permit {
                        waited: start.elapsed(),
                    })
                }
                Err(wait) => wait,
            };

            if start.elapsed() + wait > self.max_wait {
                debug!(retry_after_ms = wait.as_millis() as u64, "rate gate rejected");
                return Err(Error::rate_limited(wait));
            }
            tokio::time::sleep(wait).await;
        }
    }

    /// Whole tokens currently available
    pub fn available(&self) -> u32 {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        bucket.tokens.floor() as u32
    }

    /// Take a token, or report how long until one is available
    fn try_take(&self) -> std::result::Result<(), Duration> {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - bucket.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_per_sec))
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.last_refill = now;
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::from_config(&RateGateConfig::default())
    }
}
