//! Streaming query client.
//!
//! [`ProtocolClient::run`] drives one query through
//! `Idle → RateLimited → Connecting → Streaming → Complete | Failed`,
//! restarting at `RateLimited` with a fresh assembler whenever the retry
//! policy elects to retry.

mod decode;
mod threads;

pub use decode::{decode_frame, message_stream};
pub use threads::{ListOptions, PageObserver, PAGE_SIZE};

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::adapters::ReqwestHttpClient;
use crate::assembler::StreamAssembler;
use crate::config::ClientConfig;
use crate::error::ProtocolError;
use crate::models::{AnswerResult, QueryRequest, ResearchProgress};
use crate::rate_limiter::RateLimiter;
use crate::retry::{RetryContext, RetryPolicy};
use crate::traits::{Headers, HttpClient};

/// Per-call state of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    /// Waiting for a rate-limit token
    RateLimited,
    /// Request sent, waiting for the response head
    Connecting,
    /// Reading the event stream
    Streaming,
    Complete,
    Failed,
}

impl ClientState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientState::Idle => "idle",
            ClientState::RateLimited => "rate_limited",
            ClientState::Connecting => "connecting",
            ClientState::Streaming => "streaming",
            ClientState::Complete => "complete",
            ClientState::Failed => "failed",
        }
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observer for research progress updates.
pub type ProgressObserver = Arc<dyn Fn(&ResearchProgress) + Send + Sync>;

/// Observer for state transitions.
pub type StateObserver = Arc<dyn Fn(ClientState) + Send + Sync>;

/// Optional per-call hooks.
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Cancels the call when triggered
    pub cancel: Option<CancellationToken>,
    /// Called whenever the latest research progress changes
    pub on_progress: Option<ProgressObserver>,
    /// Called on every state transition
    pub on_state: Option<StateObserver>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn on_progress(mut self, observer: impl Fn(&ResearchProgress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(observer));
        self
    }

    pub fn on_state(mut self, observer: impl Fn(ClientState) + Send + Sync + 'static) -> Self {
        self.on_state = Some(Arc::new(observer));
        self
    }

    fn enter(&self, state: ClientState) {
        debug!(state = %state, "Query state");
        if let Some(observer) = &self.on_state {
            observer(state);
        }
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("cancel", &self.cancel.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("on_state", &self.on_state.is_some())
            .finish()
    }
}

/// Client for the streaming query protocol.
///
/// Cheap to share behind an `Arc`; concurrent calls only share the rate
/// limiter.
pub struct ProtocolClient {
    http: Arc<dyn HttpClient>,
    config: ClientConfig,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    token: String,
}

impl ProtocolClient {
    /// Create a client using reqwest as the transport.
    pub fn new(config: ClientConfig, token: impl Into<String>) -> Result<Self, ProtocolError> {
        Self::with_transport(config, token, Arc::new(ReqwestHttpClient::new()))
    }

    /// Create a client with a custom transport.
    pub fn with_transport(
        config: ClientConfig,
        token: impl Into<String>,
        http: Arc<dyn HttpClient>,
    ) -> Result<Self, ProtocolError> {
        config
            .validate()
            .map_err(|e| ProtocolError::InvalidRequest(e.to_string()))?;
        let limiter = RateLimiter::from_config(&config.rate_limit)
            .map_err(|e| ProtocolError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            http,
            retry: RetryPolicy::from_config(&config.retry),
            limiter: Arc::new(limiter),
            config,
            token: token.into(),
        })
    }

    /// Share `limiter` with other clients instead of the one built from
    /// configuration.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Run a query to completion.
    pub async fn run(&self, request: &QueryRequest) -> Result<AnswerResult, ProtocolError> {
        self.run_with(request, &RunOptions::default()).await
    }

    /// Run a query with cancellation and observers.
    pub async fn run_with(
        &self,
        request: &QueryRequest,
        options: &RunOptions,
    ) -> Result<AnswerResult, ProtocolError> {
        options.enter(ClientState::Idle);
        if request.text().trim().is_empty() {
            options.enter(ClientState::Failed);
            return Err(ProtocolError::InvalidRequest("query text is empty".to_string()));
        }

        let url = self.config.query_url();
        let body = request.to_body(&self.config.locale).to_string();
        let timeout = self.config.timeout_for(request.mode());
        let headers = self.headers("text/event-stream");
        let cancel = options.cancel.clone().unwrap_or_default();

        let result = self
            .with_retries("query", &cancel, |attempt| {
                self.attempt(&url, &body, &headers, timeout, options, attempt)
            })
            .await;

        match &result {
            Ok(answer) => {
                debug!(
                    answer_len = answer.answer.len(),
                    references = answer.references.len(),
                    "Query complete"
                );
                options.enter(ClientState::Complete);
            }
            Err(_) => options.enter(ClientState::Failed),
        }
        result
    }

    /// One attempt: token, request, stream, assemble.
    async fn attempt(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
        timeout: Duration,
        options: &RunOptions,
        attempt: u32,
    ) -> Result<AnswerResult, ProtocolError> {
        debug!(attempt, "Starting query attempt");
        options.enter(ClientState::RateLimited);
        let waited = self.limiter.acquire().await;
        if !waited.is_zero() {
            debug!(wait_ms = waited.as_millis() as u64, "Waited for rate limit token");
        }

        options.enter(ClientState::Connecting);
        let bytes = self.http.post_stream(url, body, headers, timeout).await?;

        options.enter(ClientState::Streaming);
        let mut assembler = StreamAssembler::new();
        let mut messages = Box::pin(message_stream(bytes));
        let mut last_progress: Option<ResearchProgress> = None;

        while let Some(message) = messages.next().await {
            let message = message?;
            assembler.apply(&message);

            if let Some(observer) = &options.on_progress {
                let progress = assembler.progress();
                if progress != last_progress {
                    if let Some(progress) = &progress {
                        observer(progress);
                    }
                    last_progress = progress;
                }
            }

            if assembler.is_terminal() {
                break;
            }
        }

        debug!(
            messages = assembler.state().message_count(),
            terminal = assembler.is_terminal(),
            "Stream finished"
        );
        assembler.finalize()
    }

    /// Run `operation` until it succeeds, fails for good, or `cancel` fires.
    ///
    /// `operation` gets the 1-based attempt number.
    pub(crate) async fn with_retries<T, F, Fut>(
        &self,
        name: &str,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, ProtocolError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProtocolError>>,
    {
        let mut ctx = RetryContext::new(name);

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ProtocolError::Cancelled),
                result = operation(ctx.attempt) => result,
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(ProtocolError::Cancelled) => {
                    debug!("{} cancelled", ctx.to_log_string());
                    return Err(ProtocolError::Cancelled);
                }
                Err(err) => err,
            };

            let decision = self.retry.should_retry(&err, ctx.attempt);
            if !decision.retry {
                let err = self.retry.give_up(err, ctx.attempt);
                error!(
                    code = err.error_code(),
                    error = %err,
                    "{} failed",
                    ctx.to_log_string()
                );
                return Err(err);
            }

            warn!(
                code = err.error_code(),
                error = %err,
                delay_ms = decision.delay.as_millis() as u64,
                "{} failed, retrying",
                ctx.to_log_string()
            );
            ctx.record_failure(err, decision.delay);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProtocolError::Cancelled),
                _ = tokio::time::sleep(decision.delay) => {}
            }
        }
    }

    fn headers(&self, accept: &str) -> Headers {
        let mut headers = Headers::new();
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.token),
        );
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), accept.to_string());
        headers
    }
}

impl fmt::Debug for ProtocolClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolClient")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockHttpClient, MockResponse};
    use crate::config::{RateLimitConfig, RetryConfig};
    use crate::error::TransportError;
    use crate::models::QueryMode;
    use bytes::Bytes;
    use std::sync::Mutex;

    const URL: &str = "https://www.perplexity.ai/api/pplx.generateStream";

    fn frame(json: &str) -> String {
        format!("event: message\ndata: {}\n\n", json)
    }

    fn answer_stream(text: &str) -> String {
        let answer = serde_json::json!({"markdown_block": {"chunks": [text]}, "intended_usage": "ask_text"});
        let refs = serde_json::json!({
            "intended_usage": "web_results",
            "web_result_block": {"web_results": [{"name": "Source", "url": "https://source.example"}]}
        });
        format!(
            "{}{}",
            frame(&serde_json::json!({"status": "PENDING", "blocks": [answer]}).to_string()),
            frame(
                &serde_json::json!({
                    "status": "COMPLETED",
                    "final_sse_message": true,
                    "thread_url_slug": "slug",
                    "blocks": [answer, refs]
                })
                .to_string()
            ),
        )
    }

    fn config() -> ClientConfig {
        ClientConfig::default()
            .with_rate_limit(RateLimitConfig {
                enabled: false,
                ..Default::default()
            })
            .with_retry(RetryConfig {
                max_attempts: 3,
                base_delay_ms: 10,
                max_delay_ms: 100,
            })
    }

    fn client(mock: &MockHttpClient) -> ProtocolClient {
        ProtocolClient::with_transport(config(), "secret-token", Arc::new(mock.clone())).unwrap()
    }

    #[tokio::test]
    async fn test_run_success() {
        let mock = MockHttpClient::new();
        mock.set_response(URL, MockResponse::sse(answer_stream("Paris is the capital of France.")));

        let result = client(&mock).run(&QueryRequest::new("capital of france")).await.unwrap();

        assert_eq!(result.answer, "Paris is the capital of France.");
        assert_eq!(result.references.len(), 1);
        assert_eq!(result.status, "completed");
        assert_eq!(result.thread_slug.as_deref(), Some("slug"));
    }

    #[tokio::test]
    async fn test_request_headers_body_and_timeout() {
        let mock = MockHttpClient::new();
        mock.set_response(URL, MockResponse::sse(answer_stream("a")));

        let request = QueryRequest::new("deep question")
            .with_mode(QueryMode::DeepResearch)
            .with_identifier("frontend_context_uuid", "ctx");
        client(&mock).run(&request).await.unwrap();

        let requests = mock.get_requests();
        assert_eq!(requests.len(), 1);
        let recorded = &requests[0];
        assert_eq!(
            recorded.headers.get("Authorization").map(String::as_str),
            Some("Bearer secret-token")
        );
        assert_eq!(
            recorded.headers.get("Accept").map(String::as_str),
            Some("text/event-stream")
        );
        assert_eq!(recorded.timeout, Duration::from_secs(360));
        let body = recorded.json();
        assert_eq!(body["query_str"], "deep question");
        assert_eq!(body["params"]["frontend_context_uuid"], "ctx");
        assert_eq!(body["params"]["search_implementation_mode"], "multi_step");
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let mock = MockHttpClient::new();
        mock.set_response(URL, MockResponse::sse(answer_stream("a")));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let options = RunOptions::new().on_state(move |state| sink.lock().unwrap().push(state));

        client(&mock)
            .run_with(&QueryRequest::new("q"), &options)
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ClientState::Idle,
                ClientState::RateLimited,
                ClientState::Connecting,
                ClientState::Streaming,
                ClientState::Complete,
            ]
        );
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds_with_fresh_assembler() {
        let mock = MockHttpClient::new();
        // First attempt streams a partial answer, then the connection drops
        mock.push_response(
            URL,
            MockResponse::StreamThenError(
                vec![Bytes::from(frame(
                    r#"{"blocks":[{"intended_usage":"ask_text","text":"stale partial"}]}"#,
                ))],
                TransportError::ConnectionReset {
                    message: "reset".to_string(),
                },
            ),
        );
        mock.push_response(URL, MockResponse::status(503));
        mock.push_response(URL, MockResponse::sse(answer_stream("fresh")));

        let result = client(&mock).run(&QueryRequest::new("q")).await.unwrap();

        assert_eq!(result.answer, "fresh");
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test]
    async fn test_auth_failure_not_retried() {
        let mock = MockHttpClient::new();
        mock.set_response(URL, MockResponse::status(401));

        let err = client(&mock).run(&QueryRequest::new("q")).await.unwrap_err();

        assert!(matches!(err, ProtocolError::Authentication { status: 401, .. }));
        assert!(err.requires_reauth());
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let mock = MockHttpClient::new();
        mock.set_response(URL, MockResponse::status(400));

        let err = client(&mock).run(&QueryRequest::new("q")).await.unwrap_err();

        assert!(matches!(
            err,
            ProtocolError::Transport(TransportError::Status { status: 400, .. })
        ));
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_exhausted_wraps_last_cause() {
        let mock = MockHttpClient::new();
        mock.set_response(URL, MockResponse::status(500));

        let err = client(&mock).run(&QueryRequest::new("q")).await.unwrap_err();

        match err {
            ProtocolError::RetryExhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(matches!(
                    *source,
                    ProtocolError::Transport(TransportError::Status { status: 500, .. })
                ));
            }
            other => panic!("expected RetryExhausted, got {:?}", other),
        }
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test]
    async fn test_incomplete_stream_is_retried_then_exhausted() {
        let mock = MockHttpClient::new();
        mock.set_response(
            URL,
            MockResponse::sse(frame(r#"{"blocks":[{"intended_usage":"ask_text","text":"x"}]}"#)),
        );

        let err = client(&mock).run(&QueryRequest::new("q")).await.unwrap_err();

        match err {
            ProtocolError::RetryExhausted { source, .. } => {
                assert!(matches!(*source, ProtocolError::IncompleteStream));
            }
            other => panic!("expected RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_answer_is_not_retried() {
        let mock = MockHttpClient::new();
        mock.set_response(URL, MockResponse::sse(frame(r#"{"final_sse_message":true}"#)));

        let err = client(&mock).run(&QueryRequest::new("q")).await.unwrap_err();

        assert!(matches!(err, ProtocolError::NoAnswer));
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_frame_retried() {
        let mock = MockHttpClient::new();
        mock.push_response(URL, MockResponse::sse("event: message\ndata: {not json\n\n"));
        mock.push_response(URL, MockResponse::sse(answer_stream("ok")));

        let result = client(&mock).run(&QueryRequest::new("q")).await.unwrap();
        assert_eq!(result.answer, "ok");
        assert_eq!(mock.request_count(), 2);
    }

    #[tokio::test]
    async fn test_stops_reading_after_terminal_message() {
        let mock = MockHttpClient::new();
        mock.set_response(
            URL,
            MockResponse::StreamThenHang(vec![Bytes::from(answer_stream("done"))]),
        );

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            client(&mock).run(&QueryRequest::new("q")),
        )
        .await
        .expect("run should not wait for the body to end")
        .unwrap();
        assert_eq!(result.answer, "done");
    }

    #[tokio::test]
    async fn test_cancel_in_flight() {
        let mock = MockHttpClient::new();
        mock.set_response(
            URL,
            MockResponse::StreamThenHang(vec![Bytes::from(frame(r#"{"status":"PENDING"}"#))]),
        );

        let cancel = CancellationToken::new();
        let options = RunOptions::new().with_cancel(cancel.clone());
        let client = client(&mock);

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = client
            .run_with(&QueryRequest::new("q"), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Cancelled));
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let mock = MockHttpClient::new();
        mock.set_response(URL, MockResponse::sse(answer_stream("a")));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client(&mock)
            .run_with(&QueryRequest::new("q"), &RunOptions::new().with_cancel(cancel))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Cancelled));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_progress_observer() {
        let plan = |step: &str, pct: u8| {
            frame(
                &serde_json::json!({
                    "blocks": [{"intended_usage": "plan", "plan_block": {"progress": step, "pct_complete": pct}}]
                })
                .to_string(),
            )
        };
        let body = format!(
            "{}{}{}{}",
            plan("searching", 10),
            plan("searching", 10),
            plan("writing", 90),
            answer_stream("answer")
        );
        let mock = MockHttpClient::new();
        mock.set_response(URL, MockResponse::sse(body));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let options = RunOptions::new().on_progress(move |progress| {
            sink.lock().unwrap().push(progress.pct_complete);
        });

        let result = client(&mock)
            .run_with(&QueryRequest::new("q"), &options)
            .await
            .unwrap();

        assert_eq!(result.answer, "answer");
        assert_eq!(*seen.lock().unwrap(), vec![Some(10), Some(90)]);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let mock = MockHttpClient::new();
        let err = client(&mock).run(&QueryRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidRequest(_)));
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ClientConfig::default().with_base_url("");
        let result = ProtocolClient::with_transport(config, "t", Arc::new(MockHttpClient::new()));
        assert!(matches!(result, Err(ProtocolError::InvalidRequest(_))));
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = client(&MockHttpClient::new());
        let debug = format!("{:?}", client);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("<redacted>"));
    }
}
