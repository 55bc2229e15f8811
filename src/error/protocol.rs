//! The error surfaced by every protocol operation.

use thiserror::Error;

use super::{ErrorClass, TransportError};

/// Maximum number of payload characters kept in a [`ProtocolError::MalformedFrame`].
pub const EXCERPT_LIMIT: usize = 100;

/// Failure of a query, a stream, or one of its frames.
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    /// A frame's data payload was not a valid stream message.
    #[error("malformed frame ({reason}): {excerpt}")]
    MalformedFrame { reason: String, excerpt: String },

    /// The transport closed before any message was marked terminal.
    #[error("stream ended before a terminal message")]
    IncompleteStream,

    /// A terminal message was seen but no answer text was ever populated.
    #[error("stream completed without an answer")]
    NoAnswer,

    /// The server rejected the bearer token.
    #[error("authentication failed (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },

    /// Transient failures persisted past the configured attempt limit.
    #[error("giving up after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<ProtocolError>,
    },

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// Any other transport failure.
    #[error(transparent)]
    Transport(TransportError),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ProtocolError {
    /// Build a `MalformedFrame` error, keeping at most [`EXCERPT_LIMIT`]
    /// characters of the offending payload.
    pub fn malformed(reason: impl Into<String>, payload: &str) -> Self {
        ProtocolError::MalformedFrame {
            reason: reason.into(),
            excerpt: excerpt(payload),
        }
    }

    /// Classify this error for the retry policy.
    pub fn class(&self) -> ErrorClass {
        match self {
            ProtocolError::MalformedFrame { .. } => ErrorClass::Transient,
            ProtocolError::IncompleteStream => ErrorClass::Transient,
            ProtocolError::NoAnswer => ErrorClass::Client,
            ProtocolError::Authentication { .. } => ErrorClass::Auth,
            ProtocolError::RetryExhausted { .. } => ErrorClass::Client,
            ProtocolError::Cancelled => ErrorClass::Client,
            ProtocolError::Transport(err) => err.class(),
            ProtocolError::InvalidRequest(_) => ErrorClass::Client,
        }
    }

    /// Whether the caller has to obtain a new token before retrying.
    pub fn requires_reauth(&self) -> bool {
        match self {
            ProtocolError::Authentication { .. } => true,
            ProtocolError::RetryExhausted { source, .. } => source.requires_reauth(),
            _ => false,
        }
    }

    /// Short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            ProtocolError::MalformedFrame { .. } => "E_PROTO_FRAME",
            ProtocolError::IncompleteStream => "E_PROTO_INCOMPLETE",
            ProtocolError::NoAnswer => "E_PROTO_NO_ANSWER",
            ProtocolError::Authentication { .. } => "E_PROTO_AUTH",
            ProtocolError::RetryExhausted { .. } => "E_PROTO_RETRY",
            ProtocolError::Cancelled => "E_PROTO_CANCEL",
            ProtocolError::Transport(err) => err.error_code(),
            ProtocolError::InvalidRequest(_) => "E_PROTO_REQUEST",
        }
    }

    /// User-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            ProtocolError::MalformedFrame { .. } => {
                "Received invalid data from the server. Please try again.".to_string()
            }
            ProtocolError::IncompleteStream => {
                "The server closed the connection before the answer was complete.".to_string()
            }
            ProtocolError::NoAnswer => "The server finished without producing an answer.".to_string(),
            ProtocolError::Authentication { .. } => {
                "Authentication failed. Token may be invalid or expired.".to_string()
            }
            ProtocolError::RetryExhausted { attempts, source } => {
                format!("{} (gave up after {} attempts)", source.user_message(), attempts)
            }
            ProtocolError::Cancelled => "The request was cancelled.".to_string(),
            ProtocolError::Transport(err) => err.user_message(),
            ProtocolError::InvalidRequest(msg) => format!("The request was invalid: {}", msg),
        }
    }
}

impl From<TransportError> for ProtocolError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Status { status, message } if status == 401 || status == 403 => {
                ProtocolError::Authentication { status, message }
            }
            other => ProtocolError::Transport(other),
        }
    }
}

/// First [`EXCERPT_LIMIT`] characters of `payload`, cut on a char boundary.
pub fn excerpt(payload: &str) -> String {
    payload.chars().take(EXCERPT_LIMIT).collect()
}
