//! Transport-level error types.
//!
//! These errors describe what went wrong between the client and the
//! server: connection setup, timeouts, non-2xx statuses and body reads.
//! They carry no protocol meaning on their own.

use std::fmt;

use super::ErrorClass;

/// Errors raised by an [`HttpClient`](crate::traits::HttpClient) implementation.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Connection to the server failed.
    ConnectionFailed { url: String, message: String },

    /// An established connection was reset or closed mid-body.
    ConnectionReset { message: String },

    /// Request or body read exceeded the configured timeout.
    Timeout { message: String },

    /// Server answered with a non-2xx status.
    Status { status: u16, message: String },

    /// The URL could not be parsed.
    InvalidUrl { url: String },

    /// Any other transport failure.
    Other { message: String },
}

impl TransportError {
    /// Classify this error for the retry policy.
    pub fn class(&self) -> ErrorClass {
        match self {
            TransportError::ConnectionFailed { .. } => ErrorClass::Transient,
            TransportError::ConnectionReset { .. } => ErrorClass::Transient,
            TransportError::Timeout { .. } => ErrorClass::Transient,
            TransportError::Status { status, .. } => ErrorClass::from_status(*status),
            TransportError::InvalidUrl { .. } => ErrorClass::Client,
            TransportError::Other { .. } => ErrorClass::Client,
        }
    }

    /// HTTP status, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            TransportError::ConnectionFailed { .. } => "E_NET_CONN",
            TransportError::ConnectionReset { .. } => "E_NET_RESET",
            TransportError::Timeout { .. } => "E_NET_TIMEOUT",
            TransportError::Status { .. } => "E_NET_HTTP",
            TransportError::InvalidUrl { .. } => "E_NET_URL",
            TransportError::Other { .. } => "E_NET_OTHER",
        }
    }

    /// User-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            TransportError::ConnectionFailed { .. } => {
                "Unable to connect to the server. Please check your internet connection."
                    .to_string()
            }
            TransportError::ConnectionReset { .. } => {
                "The connection was interrupted while receiving the answer.".to_string()
            }
            TransportError::Timeout { .. } => {
                "The server took too long to respond. Please try again.".to_string()
            }
            TransportError::Status { status, .. } => match *status {
                400 => "The request was invalid.".to_string(),
                401 => "Authentication failed. Token may be expired.".to_string(),
                403 => "Access forbidden. Check your permissions.".to_string(),
                404 => "The requested endpoint was not found.".to_string(),
                429 => "Rate limit exceeded. Please wait and try again.".to_string(),
                500..=599 => {
                    "The server is experiencing issues. Please try again later.".to_string()
                }
                _ => format!("The server returned an error (HTTP {}).", status),
            },
            TransportError::InvalidUrl { url } => format!("Invalid URL: {}", url),
            TransportError::Other { message } => format!("Network error: {}", message),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ConnectionFailed { url, message } => {
                write!(f, "Connection failed to '{}': {}", url, message)
            }
            TransportError::ConnectionReset { message } => {
                write!(f, "Connection reset: {}", message)
            }
            TransportError::Timeout { message } => write!(f, "Request timeout: {}", message),
            TransportError::Status { status, message } => {
                write!(f, "HTTP {} error: {}", status, message)
            }
            TransportError::InvalidUrl { url } => write!(f, "Invalid URL: {}", url),
            TransportError::Other { message } => write!(f, "Transport error: {}", message),
        }
    }
}

impl std::error::Error for TransportError {}

/// Classify a reqwest error into a TransportError.
///
/// `mid_body` marks errors raised while reading an already-open response
/// body, which are resets rather than connection failures.
pub fn classify_reqwest_error(err: &reqwest::Error, url: &str, mid_body: bool) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            message: err.to_string(),
        }
    } else if err.is_connect() {
        TransportError::ConnectionFailed {
            url: url.to_string(),
            message: err.to_string(),
        }
    } else if let Some(status) = err.status() {
        TransportError::Status {
            status: status.as_u16(),
            message: err.to_string(),
        }
    } else if err.is_builder() {
        TransportError::InvalidUrl {
            url: url.to_string(),
        }
    } else if mid_body || err.is_body() || err.is_request() {
        TransportError::ConnectionReset {
            message: err.to_string(),
        }
    } else {
        TransportError::Other {
            message: err.to_string(),
        }
    }
}
