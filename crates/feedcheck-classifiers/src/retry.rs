//! Per-model retry budget and exponential backoff with jitter

use feedcheck_core::RetryConfig;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per model, at least 1
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Fraction of the delay randomly added or removed, within [0, 1]
    pub jitter: f64,
}

impl RetryPolicy {
    /// Policy that never sleeps, for tests and local runs
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }

    /// Delay after failed attempt `attempt` (1-based), before jitter
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let ms = self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// Jittered delay after failed attempt `attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let spread = if self.jitter > 0.0 {
            rand::thread_rng().gen_range(-1.0..=1.0)
        } else {
            0.0
        };
        self.jittered(attempt, spread)
    }

    /// Delay for a given `spread` in [-1, 1]; `backoff` draws it at random
    ///
    /// Never exceeds `max_delay`, jitter included.
    pub fn jittered(&self, attempt: u32, spread: f64) -> Duration {
        let base = self.base_backoff(attempt).as_millis() as f64;
        let factor = 1.0 + self.jitter * spread.clamp(-1.0, 1.0);
        let ms = (base * factor).min(self.max_delay.as_millis() as f64);
        Duration::from_millis(ms.max(0.0) as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(350),
            jitter: 0.2,
        }
    }

    #[test]
    fn test_exponential_growth_is_capped() {
        let p = policy();
        assert_eq!(p.base_backoff(1), Duration::from_millis(100));
        assert_eq!(p.base_backoff(2), Duration::from_millis(200));
        assert_eq!(p.base_backoff(3), Duration::from_millis(350));
        assert_eq!(p.base_backoff(40), Duration::from_millis(350));
    }

    #[test]
    fn test_jitter_bounds() {
        let p = policy();
        assert_eq!(p.jittered(2, -1.0), Duration::from_millis(160));
        assert_eq!(p.jittered(2, 1.0), Duration::from_millis(240));
        assert_eq!(p.jittered(2, 0.0), Duration::from_millis(200));

        for _ in 0..100 {
            let d = p.backoff(1);
            assert!(d >= Duration::from_millis(80) && d <= Duration::from_millis(120));
        }
    }

    #[test]
    fn test_jitter_stays_under_cap() {
        let p = policy();
        assert_eq!(p.jittered(3, 1.0), Duration::from_millis(350));
        assert_eq!(p.jittered(3, -1.0), Duration::from_millis(280));

        let defaults = RetryPolicy::default();
        for attempt in 1..10 {
            assert!(defaults.jittered(attempt, 1.0) <= defaults.max_delay);
            for _ in 0..20 {
                assert!(defaults.backoff(attempt) <= defaults.max_delay);
            }
        }
    }

    #[test]
    fn test_from_config() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 2);
        assert_eq!(p.base_delay, Duration::from_millis(250));
        assert_eq!(RetryPolicy::immediate(0).max_attempts, 1);
        assert_eq!(RetryPolicy::immediate(3).backoff(2), Duration::ZERO);
    }
}
