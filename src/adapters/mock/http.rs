//! Mock HTTP client for testing.
//!
//! Provides a scripted HTTP client that returns predefined responses,
//! byte streams or errors, and records every request it receives.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::traits::{ByteStream, Headers, HttpClient, Response, TransportError};

/// A recorded HTTP request for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method
    pub method: String,
    /// Request URL
    pub url: String,
    /// Request headers
    pub headers: Headers,
    /// Request body
    pub body: String,
    /// Timeout the caller asked for
    pub timeout: Duration,
}

impl RecordedRequest {
    /// Parse the recorded body as JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a buffered response
    Success(Response),
    /// Fail before any body is returned
    Error(TransportError),
    /// Return a stream of bytes that ends cleanly
    Stream(Vec<Bytes>),
    /// Return some bytes, then fail mid-body
    StreamThenError(Vec<Bytes>, TransportError),
    /// Return some bytes, then never finish
    StreamThenHang(Vec<Bytes>),
}

impl MockResponse {
    /// Stream the given SSE text as a single chunk.
    pub fn sse(body: impl Into<String>) -> Self {
        MockResponse::Stream(vec![Bytes::from(body.into())])
    }

    /// Fail with the given HTTP status.
    pub fn status(status: u16) -> Self {
        MockResponse::Error(TransportError::Status {
            status,
            message: format!("HTTP {}", status),
        })
    }
}

/// Mock HTTP client for testing.
///
/// Responses are queued per URL and consumed in order; the last queued
/// response for a URL keeps being returned once the queue is down to one
/// entry. Clones share queues and recorded requests.
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every queued response for `url` with `response`.
    pub fn set_response(&self, url: &str, response: MockResponse) {
        let mut responses = self.responses.lock().unwrap();
        responses.insert(url.to_string(), VecDeque::from(vec![response]));
    }

    /// Queue `response` after the ones already configured for `url`.
    pub fn push_response(&self, url: &str, response: MockResponse) {
        let mut responses = self.responses.lock().unwrap();
        responses
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    /// Get all recorded requests.
    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests made so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Clear all recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    fn record_request(&self, url: &str, headers: &Headers, body: &str, timeout: Duration) {
        let mut requests = self.requests.lock().unwrap();
        requests.push(RecordedRequest {
            method: "POST".to_string(),
            url: url.to_string(),
            headers: headers.clone(),
            body: body.to_string(),
            timeout,
        });
    }

    fn next_response(&self, url: &str) -> Option<MockResponse> {
        let mut responses = self.responses.lock().unwrap();
        let queue = responses.get_mut(url)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

fn chunk_stream(chunks: Vec<Bytes>) -> impl futures::Stream<Item = Result<Bytes, TransportError>> {
    futures::stream::iter(chunks.into_iter().map(Ok))
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn post(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
        timeout: Duration,
    ) -> Result<Response, TransportError> {
        self.record_request(url, headers, body, timeout);

        match self.next_response(url) {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            Some(_) => Err(TransportError::Other {
                message: "Stream response on non-stream request".to_string(),
            }),
            None => Err(TransportError::Other {
                message: format!("No mock response for URL: {}", url),
            }),
        }
    }

    async fn post_stream(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
        timeout: Duration,
    ) -> Result<ByteStream, TransportError> {
        use futures::StreamExt;

        self.record_request(url, headers, body, timeout);

        match self.next_response(url) {
            Some(MockResponse::Stream(chunks)) => Ok(Box::pin(chunk_stream(chunks))),
            Some(MockResponse::StreamThenError(chunks, err)) => Ok(Box::pin(
                chunk_stream(chunks).chain(futures::stream::once(async move { Err(err) })),
            )),
            Some(MockResponse::StreamThenHang(chunks)) => {
                Ok(Box::pin(chunk_stream(chunks).chain(futures::stream::pending())))
            }
            Some(MockResponse::Error(err)) => Err(err),
            Some(MockResponse::Success(_)) => Err(TransportError::Other {
                message: "Non-stream response on stream request".to_string(),
            }),
            None => Err(TransportError::Other {
                message: format!("No mock response for URL: {}", url),
            }),
        }
    }
}
