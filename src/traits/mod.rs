//! Trait abstractions for dependency injection and testability.
//!
//! - [`HttpClient`] - HTTP client operations (buffered and streaming POST)

pub mod http;

pub use http::{ByteStream, Headers, HttpClient, Response, TransportError};
