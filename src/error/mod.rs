//! Error handling for the streaming query client.
//!
//! - **Transport errors**: what the HTTP layer reports (`TransportError`)
//! - **Protocol errors**: the single typed failure a caller receives (`ProtocolError`)
//! - **Error classes**: the retry policy's view of a failure (`ErrorClass`)
//!
//! | Class | Examples | Retried |
//! |-------|----------|---------|
//! | Transient | reset, timeout, 429, 5xx, malformed frame, truncated stream | Yes |
//! | Auth | 401, 403 | No |
//! | Client | other 4xx, no answer, invalid request | No |

mod class;
mod protocol;
mod transport;

pub use class::ErrorClass;
pub use protocol::{excerpt, ProtocolError, EXCERPT_LIMIT};
pub use transport::{classify_reqwest_error, TransportError};

/// Result alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
