use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::LocaleConfig;

/// Query mode. Only affects the request timeout and the search
/// implementation the server is asked to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    #[default]
    Standard,
    /// Multi-step research, which can run for minutes
    DeepResearch,
}

impl QueryMode {
    /// Value of `search_implementation_mode` on the wire.
    pub fn search_implementation(&self) -> &'static str {
        match self {
            QueryMode::Standard => "standard",
            QueryMode::DeepResearch => "multi_step",
        }
    }
}

/// A single query: text, opaque caller identifiers and a mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    text: String,
    identifiers: BTreeMap<String, String>,
    mode: QueryMode,
}

impl QueryRequest {
    /// Create a standard-mode request with no identifiers.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            identifiers: BTreeMap::new(),
            mode: QueryMode::Standard,
        }
    }

    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Attach an identifier sent verbatim in the request parameters
    /// (e.g. `frontend_context_uuid`).
    pub fn with_identifier(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.identifiers.insert(key.into(), value.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    pub fn identifiers(&self) -> &BTreeMap<String, String> {
        &self.identifiers
    }

    /// Build the JSON body posted to the query endpoint.
    ///
    /// Caller identifiers override the generated parameters of the same
    /// name. A fresh `frontend_uuid` is generated unless one was supplied.
    pub fn to_body(&self, locale: &LocaleConfig) -> Value {
        let params = QueryParams {
            language: &locale.language,
            timezone: &locale.timezone,
            search_focus: "internet",
            mode: "copilot",
            frontend_uuid: Uuid::new_v4().to_string(),
            frontend_context_uuid: Uuid::new_v4().to_string(),
            version: &locale.api_version,
            sources: &["web"],
            attachments: Vec::new(),
            model_preference: &locale.model_preference,
            search_implementation_mode: self.mode.search_implementation(),
            is_related_query: false,
            is_incognito: false,
            prompt_source: "user",
            query_source: "home",
            use_schematized_api: true,
            send_back_text_in_streaming_api: false,
            skip_search_enabled: true,
        };

        let mut params = match serde_json::to_value(params) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        for (key, value) in &self.identifiers {
            params.insert(key.clone(), Value::String(value.clone()));
        }

        let mut body = Map::new();
        body.insert("query_str".to_string(), Value::String(self.text.clone()));
        body.insert("params".to_string(), Value::Object(params));
        Value::Object(body)
    }
}

#[derive(Serialize)]
struct QueryParams<'a> {
    language: &'a str,
    timezone: &'a str,
    search_focus: &'a str,
    mode: &'a str,
    frontend_uuid: String,
    frontend_context_uuid: String,
    version: &'a str,
    sources: &'a [&'a str],
    attachments: Vec<Value>,
    model_preference: &'a str,
    search_implementation_mode: &'a str,
    is_related_query: bool,
    is_incognito: bool,
    prompt_source: &'a str,
    query_source: &'a str,
    use_schematized_api: bool,
    send_back_text_in_streaming_api: bool,
    skip_search_enabled: bool,
}
