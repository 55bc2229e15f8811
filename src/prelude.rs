//! Prelude module for convenient imports.
//!
//! ```ignore
//! use perplexity_stream::prelude::*;
//! ```

// Client
pub use crate::client::{ClientState, ListOptions, ProtocolClient, RunOptions};

// Configuration
pub use crate::config::{ClientConfig, ConfigError, RateLimitConfig, RetryConfig};

// Errors
pub use crate::error::{ErrorClass, ProtocolError, TransportError};

// Model types
pub use crate::models::{
    AnswerResult, QueryMode, QueryRequest, Reference, ResearchProgress, ThreadQuery, ThreadRecord,
};

// Building blocks
pub use crate::assembler::StreamAssembler;
pub use crate::rate_limiter::RateLimiter;
pub use crate::retry::RetryPolicy;
pub use crate::sse::SseFrameReader;
