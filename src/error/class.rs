//! Error classification used by the retry policy.
//!
//! Every failure that reaches the protocol client falls into exactly one
//! class. The class alone decides whether an attempt may be repeated.

use std::fmt;

/// High-level classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Connection resets, timeouts, HTTP 429/5xx, malformed or truncated
    /// streams. Retried with exponential backoff.
    Transient,

    /// HTTP 401/403. Never retried; the caller must refresh credentials.
    Auth,

    /// Malformed requests, other 4xx responses, answers the server cannot
    /// produce. Never retried.
    Client,
}

impl ErrorClass {
    /// Returns true if errors in this class may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClass::Transient)
    }

    /// Short label for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Transient => "transient",
            ErrorClass::Auth => "auth",
            ErrorClass::Client => "client",
        }
    }

    /// User-facing description of the class.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorClass::Transient => "Temporary network or server issue",
            ErrorClass::Auth => "Authentication problem",
            ErrorClass::Client => "Request rejected",
        }
    }

    /// Suggested recovery action.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorClass::Transient => "Wait a moment and try again",
            ErrorClass::Auth => "Refresh your token and try again",
            ErrorClass::Client => "Check the query and configuration",
        }
    }

    /// Classify an HTTP status code.
    ///
    /// 2xx and 3xx never reach here as failures, so anything outside the
    /// known buckets is treated as a client error.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorClass::Auth,
            429 => ErrorClass::Transient,
            500..=599 => ErrorClass::Transient,
            _ => ErrorClass::Client,
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
