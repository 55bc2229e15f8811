//! perplexity-stream - a streaming query client for an SSE answer protocol
//!
//! A query is posted once and answered by a long-lived `text/event-stream`
//! response whose messages carry incremental block updates. The crate reads
//! the stream into frames ([`sse`]), folds block updates into a single
//! answer ([`assembler`]), and wraps each call in rate limiting
//! ([`rate_limiter`]) and classified retries ([`retry`]) via
//! [`client::ProtocolClient`].

pub mod adapters;
pub mod assembler;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod prelude;
pub mod rate_limiter;
pub mod retry;
pub mod sse;
pub mod traits;
