//! Shared fixtures for integration tests.
//!
//! Builders for SSE bodies in the shape the query endpoint streams, and a
//! client configuration pointed at a local mock server.

#![allow(dead_code)]

use std::time::Duration;

use perplexity_stream::config::{ClientConfig, RateLimitConfig, RetryConfig};
use serde_json::{json, Value};

pub const TEST_TOKEN: &str = "test-session-token";

/// One `message` frame carrying `payload`.
pub fn frame(payload: &Value) -> String {
    format!("event: message\r\ndata: {}\r\n\r\n", payload)
}

/// A message with the given blocks.
pub fn message(status: &str, blocks: Vec<Value>, terminal: bool) -> Value {
    json!({
        "status": status,
        "final_sse_message": terminal,
        "text_completed": terminal,
        "blocks": blocks,
    })
}

/// An answer block snapshot.
pub fn answer_block(text: &str) -> Value {
    json!({
        "intended_usage": "ask_text",
        "markdown_block": { "answer": text, "chunks": [text] },
    })
}

/// An answer block sent as a root-replace patch.
pub fn answer_patch(text: &str) -> Value {
    json!({
        "intended_usage": "ask_text",
        "diff_block": {
            "field": "markdown_block",
            "patches": [{ "op": "replace", "path": "", "value": { "answer": text } }],
        },
    })
}

/// A web-results block.
pub fn web_results(results: &[(&str, &str)]) -> Value {
    let entries: Vec<Value> = results
        .iter()
        .map(|(name, url)| json!({ "name": name, "url": url, "snippet": "..." }))
        .collect();
    json!({
        "intended_usage": "web_results",
        "web_result_block": { "web_results": entries },
    })
}

/// A research-plan block.
pub fn plan_block(step: &str, pct: u8) -> Value {
    json!({
        "intended_usage": "pro_search_steps",
        "plan_block": { "progress": step, "pct_complete": pct, "goals": [] },
    })
}

/// A complete stream: pending, partial answer, then the terminal answer.
pub fn answer_stream(answer: &str) -> String {
    let partial: String = answer.chars().take(answer.chars().count() / 2).collect();
    [
        frame(&message("PENDING", vec![], false)),
        frame(&message("PENDING", vec![answer_block(&partial)], false)),
        frame(&message(
            "COMPLETED",
            vec![
                answer_block(answer),
                web_results(&[("Paris - Wikipedia", "https://en.wikipedia.org/wiki/Paris")]),
            ],
            true,
        )),
    ]
    .concat()
}

/// Configuration for `server_uri` with fast retries and no rate limiting.
pub fn test_config(server_uri: &str) -> ClientConfig {
    ClientConfig::default()
        .with_base_url(server_uri)
        .with_timeout(Duration::from_secs(5))
        .with_rate_limit(RateLimitConfig {
            enabled: false,
            ..Default::default()
        })
        .with_retry(RetryConfig {
            max_attempts: 3,
            base_delay_ms: 10,
            max_delay_ms: 50,
        })
}
