//! Retry policy for query attempts.
//!
//! Only [`ErrorClass::Transient`] failures are retried. Delays grow
//! exponentially from the base delay, are capped, and get a random jitter
//! in `[0, base)` on top.

use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::RetryConfig;
use crate::error::{ErrorClass, ProtocolError};

/// Outcome of [`RetryPolicy::should_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub retry: bool,
    /// How long to wait before the next attempt (zero when not retrying)
    pub delay: Duration,
}

impl RetryDecision {
    pub fn stop() -> Self {
        Self {
            retry: false,
            delay: Duration::ZERO,
        }
    }

    pub fn after(delay: Duration) -> Self {
        Self { retry: true, delay }
    }
}

/// Decides whether a failed attempt is retried and how long to wait.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` counts the first attempt, so `1`
    /// disables retries.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Decide what to do after `error` ended attempt number `attempt`
    /// (1-based).
    pub fn should_retry(&self, error: &ProtocolError, attempt: u32) -> RetryDecision {
        if error.class() != ErrorClass::Transient || attempt >= self.max_attempts {
            return RetryDecision::stop();
        }
        RetryDecision::after(self.backoff(attempt) + self.jitter())
    }

    /// Exponential part of the delay after attempt `attempt`:
    /// `base * 2^(attempt - 1)`, capped at the maximum delay.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn jitter(&self) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        if base_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..base_ms))
    }

    /// Turn the error that ended the last attempt into the error surfaced to
    /// the caller.
    ///
    /// Transient errors that ran out of attempts are wrapped in
    /// [`ProtocolError::RetryExhausted`]; everything else passes through.
    pub fn give_up(&self, error: ProtocolError, attempt: u32) -> ProtocolError {
        if error.class() == ErrorClass::Transient {
            ProtocolError::RetryExhausted {
                attempts: attempt,
                source: Box::new(error),
            }
        } else {
            error
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Bookkeeping for the attempts of one top-level call.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Human-readable description of the operation being retried
    pub operation: String,
    /// Attempt currently running (1-based)
    pub attempt: u32,
    /// Error that ended the previous attempt
    pub last_error: Option<ProtocolError>,
    /// Sum of all backoff delays slept so far
    pub total_delay: Duration,
    started: Instant,
}

impl RetryContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            attempt: 1,
            last_error: None,
            total_delay: Duration::ZERO,
            started: Instant::now(),
        }
    }

    /// Record a failed attempt and the delay before the next one.
    pub fn record_failure(&mut self, error: ProtocolError, delay: Duration) {
        self.last_error = Some(error);
        self.total_delay += delay;
        self.attempt += 1;
    }

    /// Wall-clock time since the first attempt started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Get a formatted context string suitable for logging.
    pub fn to_log_string(&self) -> String {
        let mut parts = vec![
            format!("operation={}", self.operation),
            format!("attempt={}", self.attempt),
        ];
        if let Some(ref err) = self.last_error {
            parts.push(format!("last_error={}", err.error_code()));
        }
        if !self.total_delay.is_zero() {
            parts.push(format!("total_delay_ms={}", self.total_delay.as_millis()));
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1000), Duration::from_millis(30_000))
    }

    fn status(code: u16) -> ProtocolError {
        ProtocolError::from(TransportError::Status {
            status: code,
            message: format!("HTTP {}", code),
        })
    }

    #[test]
    fn test_429_first_attempt_delay_range() {
        let policy = policy();
        for _ in 0..50 {
            let decision = policy.should_retry(&status(429), 1);
            assert!(decision.retry);
            assert!(decision.delay >= Duration::from_millis(1000));
            assert!(decision.delay < Duration::from_millis(2000));
        }
    }

    #[test]
    fn test_no_retry_at_max_attempts() {
        let policy = policy();
        assert!(policy.should_retry(&status(503), 2).retry);
        let decision = policy.should_retry(&status(503), 3);
        assert!(!decision.retry);
        assert_eq!(decision.delay, Duration::ZERO);
    }

    #[test]
    fn test_transient_errors_retried() {
        let policy = policy();
        let transient = [
            status(429),
            status(500),
            status(502),
            ProtocolError::Transport(TransportError::ConnectionReset {
                message: "reset".to_string(),
            }),
            ProtocolError::Transport(TransportError::Timeout {
                message: "timed out".to_string(),
            }),
            ProtocolError::malformed("bad json", "{oops"),
            ProtocolError::IncompleteStream,
        ];
        for err in &transient {
            assert!(policy.should_retry(err, 1).retry, "{:?}", err);
        }
    }

    #[test]
    fn test_fatal_errors_never_retried() {
        let policy = policy();
        let fatal = [
            status(401),
            status(403),
            status(400),
            status(404),
            ProtocolError::NoAnswer,
            ProtocolError::Cancelled,
            ProtocolError::InvalidRequest("empty query".to_string()),
        ];
        for err in &fatal {
            assert!(!policy.should_retry(err, 1).retry, "{:?}", err);
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(5));
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(4), Duration::from_secs(5));
        assert_eq!(policy.backoff(60), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_base_has_no_jitter() {
        let policy = RetryPolicy::new(3, Duration::ZERO, Duration::ZERO);
        assert_eq!(
            policy.should_retry(&status(503), 1),
            RetryDecision::after(Duration::ZERO)
        );
    }

    #[test]
    fn test_give_up_wraps_transient_only() {
        let policy = policy();

        match policy.give_up(status(503), 3) {
            ProtocolError::RetryExhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, ProtocolError::Transport(_)));
            }
            other => panic!("expected RetryExhausted, got {:?}", other),
        }

        assert!(matches!(
            policy.give_up(status(401), 1),
            ProtocolError::Authentication { status: 401, .. }
        ));
        assert!(matches!(
            policy.give_up(ProtocolError::NoAnswer, 1),
            ProtocolError::NoAnswer
        ));
    }

    #[test]
    fn test_max_attempts_floor() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10), Duration::from_millis(10));
        assert_eq!(policy.max_attempts(), 1);
        assert!(!policy.should_retry(&status(503), 1).retry);
    }

    #[test]
    fn test_retry_context_tracks_attempts() {
        let mut ctx = RetryContext::new("query");
        assert_eq!(ctx.attempt, 1);
        assert_eq!(ctx.to_log_string(), "operation=query attempt=1");

        ctx.record_failure(status(503), Duration::from_millis(1500));
        assert_eq!(ctx.attempt, 2);
        assert_eq!(ctx.total_delay, Duration::from_millis(1500));
        assert!(ctx.to_log_string().contains("total_delay_ms=1500"));
        assert!(ctx.last_error.is_some());
    }
}
