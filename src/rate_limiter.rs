//! Token-bucket rate limiter shared by every request a client makes.
//!
//! The bucket holds up to `capacity` tokens and refills continuously at
//! `capacity / period`. `acquire` holds the bucket lock while it sleeps, so
//! waiting callers are admitted one at a time and no token is handed out
//! twice.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::{ConfigError, RateLimitConfig};

/// Snapshot of limiter activity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiterStats {
    /// Calls to `acquire` admitted while the limiter was enabled
    pub total_requests: u64,
    /// Sum of all waits
    pub total_wait: Duration,
    /// `total_wait / total_requests`
    pub average_wait: Duration,
    /// Tokens left after the last refill
    pub current_tokens: f64,
}

#[derive(Debug)]
struct Bucket {
    enabled: bool,
    capacity: f64,
    period: Duration,
    tokens: f64,
    last_refill: Instant,
    total_requests: u64,
    total_wait: Duration,
}

impl Bucket {
    fn rate(&self) -> f64 {
        self.capacity / self.period.as_secs_f64()
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate()).min(self.capacity);
        self.last_refill = now;
    }
}

/// Token-bucket admission control.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create an enabled limiter admitting `capacity` requests per `period`.
    /// The bucket starts full.
    pub fn new(capacity: u32, period: Duration) -> Result<Self, ConfigError> {
        validate(capacity, period)?;
        Ok(Self::with_bucket(capacity, period, true))
    }

    /// Create a limiter whose `acquire` never waits.
    pub fn disabled() -> Self {
        Self::with_bucket(1, Duration::from_secs(1), false)
    }

    /// Build a limiter from configuration.
    pub fn from_config(config: &RateLimitConfig) -> Result<Self, ConfigError> {
        validate(config.requests_per_period, config.period())?;
        Ok(Self::with_bucket(
            config.requests_per_period,
            config.period(),
            config.enabled,
        ))
    }

    fn with_bucket(capacity: u32, period: Duration, enabled: bool) -> Self {
        Self {
            bucket: Mutex::new(Bucket {
                enabled,
                capacity: capacity as f64,
                period,
                tokens: capacity as f64,
                last_refill: Instant::now(),
                total_requests: 0,
                total_wait: Duration::ZERO,
            }),
        }
    }

    /// Wait until a token is available and consume it.
    ///
    /// Returns how long the caller had to wait (zero when a token was
    /// available or the limiter is disabled).
    pub async fn acquire(&self) -> Duration {
        let mut bucket = self.bucket.lock().await;
        if !bucket.enabled {
            return Duration::ZERO;
        }

        bucket.refill(Instant::now());

        let wait = if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Duration::ZERO
        } else {
            let wait = Duration::from_secs_f64((1.0 - bucket.tokens) / bucket.rate());
            debug!(wait_ms = wait.as_millis() as u64, "Rate limited, waiting for token");
            tokio::time::sleep(wait).await;
            bucket.tokens = 0.0;
            bucket.last_refill = Instant::now();
            wait
        };

        bucket.total_requests += 1;
        bucket.total_wait += wait;
        wait
    }

    /// Change capacity and refill period. The token count is clamped to the
    /// new capacity.
    pub async fn configure(&self, capacity: u32, period: Duration) -> Result<(), ConfigError> {
        validate(capacity, period)?;
        let mut bucket = self.bucket.lock().await;
        bucket.refill(Instant::now());
        bucket.capacity = capacity as f64;
        bucket.period = period;
        bucket.tokens = bucket.tokens.min(bucket.capacity);
        Ok(())
    }

    /// Enable or disable the limiter.
    pub async fn set_enabled(&self, enabled: bool) {
        self.bucket.lock().await.enabled = enabled;
    }

    pub async fn is_enabled(&self) -> bool {
        self.bucket.lock().await.enabled
    }

    /// Current statistics.
    pub async fn stats(&self) -> RateLimiterStats {
        let bucket = self.bucket.lock().await;
        let average_wait = if bucket.total_requests == 0 {
            Duration::ZERO
        } else {
            bucket.total_wait.div_f64(bucket.total_requests as f64)
        };
        RateLimiterStats {
            total_requests: bucket.total_requests,
            total_wait: bucket.total_wait,
            average_wait,
            current_tokens: bucket.tokens,
        }
    }
}

fn validate(capacity: u32, period: Duration) -> Result<(), ConfigError> {
    if capacity == 0 {
        return Err(ConfigError::Invalid(
            "rate limit capacity must be at least 1".to_string(),
        ));
    }
    if period.is_zero() {
        return Err(ConfigError::Invalid(
            "rate limit period must be positive".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_burst_up_to_capacity_is_immediate() {
        let limiter = RateLimiter::new(5, Duration::from_secs(10)).unwrap();
        let start = Instant::now();
        for _ in 0..5 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_plus_one_waits_one_interval() {
        let limiter = RateLimiter::new(4, Duration::from_secs(8)).unwrap();
        for _ in 0..4 {
            limiter.acquire().await;
        }

        let start = Instant::now();
        let waited = limiter.acquire().await;

        assert_eq!(waited, Duration::from_secs(2));
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_after_elapsed_time() {
        let limiter = RateLimiter::new(2, Duration::from_secs(2)).unwrap();
        limiter.acquire().await;
        limiter.acquire().await;

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(limiter.acquire().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_capped_at_capacity() {
        let limiter = RateLimiter::new(2, Duration::from_secs(2)).unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;

        assert_eq!(limiter.acquire().await, Duration::ZERO);
        assert_eq!(limiter.acquire().await, Duration::ZERO);
        assert!(limiter.acquire().await > Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_never_waits() {
        let limiter = RateLimiter::disabled();
        for _ in 0..100 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }
        assert!(!limiter.is_enabled().await);
        assert_eq!(limiter.stats().await.total_requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_from_config_respects_enabled_flag() {
        let config = RateLimitConfig {
            enabled: false,
            ..Default::default()
        };
        let limiter = RateLimiter::from_config(&config).unwrap();
        assert!(!limiter.is_enabled().await);

        limiter.set_enabled(true).await;
        assert!(limiter.is_enabled().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_never_share_a_token() {
        let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(2)).unwrap());
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                Instant::now()
            }));
        }

        let mut finished = Vec::new();
        for handle in handles {
            finished.push(handle.await.unwrap() - start);
        }
        finished.sort();

        // Two immediate, then one per second
        assert_eq!(finished[0], Duration::ZERO);
        assert_eq!(finished[1], Duration::ZERO);
        assert!(finished[2] >= Duration::from_secs(1));
        assert!(finished[3] >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats() {
        let limiter = RateLimiter::new(1, Duration::from_secs(1)).unwrap();
        limiter.acquire().await;
        limiter.acquire().await;

        let stats = limiter.stats().await;
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.total_wait, Duration::from_secs(1));
        assert_eq!(stats.average_wait, Duration::from_millis(500));
        assert_eq!(stats.current_tokens, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_average_with_large_request_count() {
        let limiter = RateLimiter::new(1, Duration::from_secs(1)).unwrap();
        {
            let mut bucket = limiter.bucket.lock().await;
            bucket.total_requests = 1 << 32;
            bucket.total_wait = Duration::from_secs(1 << 32);
        }

        let stats = limiter.stats().await;
        assert_eq!(stats.total_requests, 1 << 32);
        assert_eq!(stats.average_wait, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_configure_clamps_tokens() {
        let limiter = RateLimiter::new(10, Duration::from_secs(10)).unwrap();
        limiter.configure(2, Duration::from_secs(2)).await.unwrap();
        assert_eq!(limiter.stats().await.current_tokens, 2.0);

        assert!(limiter.configure(0, Duration::from_secs(1)).await.is_err());
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(RateLimiter::new(0, Duration::from_secs(1)).is_err());
        assert!(RateLimiter::new(1, Duration::ZERO).is_err());
    }
}
