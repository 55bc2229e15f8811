//! Final answer types and the readers that pull them out of block content.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::MessageStatus;

/// A source reference attached to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Reference {
    /// Read every entry of `web_result_block.web_results` in `content`.
    ///
    /// Returns `None` if the content has no result list at all, and skips
    /// entries that are not objects.
    pub fn list_from_content(content: &Value) -> Option<Vec<Reference>> {
        let results = content
            .get("web_result_block")?
            .get("web_results")?
            .as_array()?;

        Some(
            results
                .iter()
                .filter(|entry| entry.is_object())
                .map(|entry| Reference {
                    title: string_field(entry, "name").unwrap_or_default(),
                    url: string_field(entry, "url").unwrap_or_default(),
                    snippet: string_field(entry, "snippet"),
                    timestamp: string_field(entry, "timestamp"),
                })
                .collect(),
        )
    }
}

/// The assembled result of one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    pub references: Vec<Reference>,
    /// Status of the terminal message
    pub status: String,
    /// Slug of the thread the server stored the query under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_slug: Option<String>,
}

impl AnswerResult {
    pub fn new(answer: String, references: Vec<Reference>, status: &MessageStatus) -> Self {
        Self {
            answer,
            references,
            status: status.to_string(),
            thread_slug: None,
        }
    }

    pub fn with_thread_slug(mut self, slug: Option<String>) -> Self {
        self.thread_slug = slug;
        self
    }
}

/// Research plan state reported by deep research queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchProgress {
    pub progress: Option<String>,
    pub eta_seconds: Option<u64>,
    pub goals: Vec<String>,
    pub pct_complete: Option<u8>,
}

impl ResearchProgress {
    /// Read `plan_block` from a progress block's content.
    ///
    /// A missing or empty `plan_block` yields `None`.
    pub fn from_content(content: &Value) -> Option<Self> {
        let plan = content.get("plan_block")?.as_object()?;
        if plan.is_empty() {
            return None;
        }

        let goals = plan
            .get("goals")
            .and_then(Value::as_array)
            .map(|goals| {
                goals
                    .iter()
                    .filter_map(|goal| match goal {
                        Value::String(text) => Some(text.clone()),
                        other => other
                            .get("description")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            progress: plan
                .get("progress")
                .and_then(Value::as_str)
                .map(str::to_string),
            eta_seconds: plan.get("eta_seconds_remaining").and_then(Value::as_u64),
            goals,
            pct_complete: plan
                .get("pct_complete")
                .and_then(Value::as_u64)
                .map(|pct| pct.min(100) as u8),
        })
    }
}

/// Extract answer text from an answer-text block's content.
///
/// The first populated shape wins: `markdown_block.chunks` (joined),
/// `markdown_block.answer`, `text`, `answer_block.text`, or the content
/// itself when it is a bare string.
pub fn extract_answer_text(content: &Value) -> Option<String> {
    if let Value::String(text) = content {
        return Some(text.clone());
    }

    if let Some(markdown) = content.get("markdown_block") {
        if let Some(chunks) = markdown.get("chunks").and_then(Value::as_array) {
            let joined: String = chunks.iter().filter_map(Value::as_str).collect();
            if !joined.is_empty() {
                return Some(joined);
            }
        }
        if let Some(answer) = string_field(markdown, "answer") {
            return Some(answer);
        }
    }

    if let Some(text) = string_field(content, "text") {
        return Some(text);
    }

    content
        .get("answer_block")
        .and_then(|block| string_field(block, "text"))
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_answer_text_precedence() {
        let content = json!({
            "markdown_block": {"chunks": ["Paris ", "is nice."], "answer": "ignored"},
            "text": "also ignored"
        });
        assert_eq!(
            extract_answer_text(&content).as_deref(),
            Some("Paris is nice.")
        );

        let content = json!({"markdown_block": {"chunks": [], "answer": "From answer"}});
        assert_eq!(extract_answer_text(&content).as_deref(), Some("From answer"));

        let content = json!({"text": "Plain"});
        assert_eq!(extract_answer_text(&content).as_deref(), Some("Plain"));

        let content = json!({"answer_block": {"text": "Nested"}});
        assert_eq!(extract_answer_text(&content).as_deref(), Some("Nested"));

        assert_eq!(
            extract_answer_text(&json!("bare")).as_deref(),
            Some("bare")
        );
        assert_eq!(extract_answer_text(&json!({"other": 1})), None);
    }

    #[test]
    fn test_references_from_content() {
        let content = json!({
            "web_result_block": {
                "web_results": [
                    {"name": "Rust", "url": "https://rust-lang.org", "snippet": "A language"},
                    {"url": "https://example.com", "timestamp": "2025-01-01"},
                    "not an object"
                ]
            }
        });

        let refs = Reference::list_from_content(&content).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].title, "Rust");
        assert_eq!(refs[0].snippet.as_deref(), Some("A language"));
        assert_eq!(refs[1].title, "");
        assert_eq!(refs[1].timestamp.as_deref(), Some("2025-01-01"));

        assert!(Reference::list_from_content(&json!({})).is_none());
    }

    #[test]
    fn test_progress_full() {
        let content = json!({
            "plan_block": {
                "progress": "Researching step 3 of 5",
                "eta_seconds_remaining": 120,
                "goals": ["Analyse sources", "Synthesise findings", "Verify claims"],
                "pct_complete": 60
            }
        });
        let progress = ResearchProgress::from_content(&content).unwrap();
        assert_eq!(progress.progress.as_deref(), Some("Researching step 3 of 5"));
        assert_eq!(progress.eta_seconds, Some(120));
        assert_eq!(progress.goals.len(), 3);
        assert_eq!(progress.pct_complete, Some(60));
    }

    #[test]
    fn test_progress_missing_or_empty_plan() {
        assert!(ResearchProgress::from_content(&json!({"other_data": "value"})).is_none());
        assert!(ResearchProgress::from_content(&json!({"plan_block": {}})).is_none());
    }

    #[test]
    fn test_progress_optional_keys() {
        let progress =
            ResearchProgress::from_content(&json!({"plan_block": {"progress": "In progress"}}))
                .unwrap();
        assert_eq!(progress.eta_seconds, None);
        assert!(progress.goals.is_empty());
        assert_eq!(progress.pct_complete, None);
    }
}
