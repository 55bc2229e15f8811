//! Stream messages and the blocks they carry.
//!
//! Each SSE frame's data payload decodes into a [`WireMessage`], which is
//! then validated into a [`StreamMessage`]. Blocks hold whole-value
//! snapshots; the only patch form accepted is a `replace` at the root path,
//! which is itself a whole-value replacement.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::{deserialize_nullable_bool, deserialize_nullable_string, deserialize_opt_id};
use crate::error::ProtocolError;

/// Usage kind of a block, derived from its `intended_usage` field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Answer text (`ask_text`, `ask_text_0_markdown`, ...)
    AnswerText,
    /// Source references (`web_results`)
    WebResults,
    /// Research plan updates (`plan`, `pro_search_steps`)
    Progress,
    /// Anything else, kept under its raw name
    Other(String),
}

impl BlockKind {
    /// Map an `intended_usage` value to its kind.
    pub fn from_usage(usage: &str) -> Self {
        if usage.starts_with("ask_text") {
            BlockKind::AnswerText
        } else {
            match usage {
                "web_results" => BlockKind::WebResults,
                "plan" | "pro_search_steps" => BlockKind::Progress,
                other => BlockKind::Other(other.to_string()),
            }
        }
    }

    /// Stable name for logging.
    pub fn as_str(&self) -> &str {
        match self {
            BlockKind::AnswerText => "answer-text",
            BlockKind::WebResults => "web-results",
            BlockKind::Progress => "progress",
            BlockKind::Other(raw) => raw,
        }
    }
}

/// How a block sets its field.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockUpdate {
    /// The block's own content keys are the new value
    Snapshot(Value),
    /// A root `replace` patch of one content key
    Replace { key: String, value: Value },
}

impl BlockUpdate {
    /// Resolve the update into the content object stored for the field.
    ///
    /// A root replace of `key` becomes `{key: value}`, so both forms are
    /// read the same way afterwards.
    pub fn into_content(self) -> Value {
        match self {
            BlockUpdate::Snapshot(content) => content,
            BlockUpdate::Replace { key, value } => {
                let mut content = Map::new();
                content.insert(key, value);
                Value::Object(content)
            }
        }
    }
}

/// A named unit of server state carried by a message.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Field name (`intended_usage`)
    pub field: String,
    /// Usage kind derived from the field name
    pub kind: BlockKind,
    /// New value for the field
    pub update: BlockUpdate,
}

impl Block {
    /// Build a block from its wire object.
    ///
    /// Returns `Ok(None)` for blocks without an `intended_usage`, which
    /// carry no addressable state.
    fn from_wire(raw: &Value) -> Result<Option<Self>, ProtocolError> {
        let object = match raw.as_object() {
            Some(object) => object,
            None => {
                return Err(ProtocolError::malformed(
                    "block is not an object",
                    &raw.to_string(),
                ))
            }
        };

        let field = match object.get("intended_usage").and_then(Value::as_str) {
            Some(field) if !field.is_empty() => field.to_string(),
            _ => return Ok(None),
        };

        let update = match object.get("diff_block") {
            Some(diff) => parse_diff(diff)?,
            None => {
                let content: Map<String, Value> = object
                    .iter()
                    .filter(|(key, _)| key.as_str() != "intended_usage")
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                BlockUpdate::Snapshot(Value::Object(content))
            }
        };

        Ok(Some(Block {
            kind: BlockKind::from_usage(&field),
            field,
            update,
        }))
    }
}

fn parse_diff(diff: &Value) -> Result<BlockUpdate, ProtocolError> {
    let key = diff
        .get("field")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::malformed("diff_block without field", &diff.to_string()))?;

    let patches = diff
        .get("patches")
        .and_then(Value::as_array)
        .ok_or_else(|| ProtocolError::malformed("diff_block without patches", &diff.to_string()))?;

    // Only the last root replace counts; anything that is not a root
    // replace would need the previous value, which is never merged.
    let mut replacement = None;
    for patch in patches {
        let op = patch.get("op").and_then(Value::as_str);
        let path = patch.get("path").and_then(Value::as_str).unwrap_or("");
        match (op, path) {
            (Some("replace"), "" | "/") => {
                replacement = Some(patch.get("value").cloned().unwrap_or(Value::Null));
            }
            _ => {
                return Err(ProtocolError::malformed(
                    "unsupported patch operation",
                    &patch.to_string(),
                ))
            }
        }
    }

    let value = replacement
        .ok_or_else(|| ProtocolError::malformed("diff_block without patches", &diff.to_string()))?;
    Ok(BlockUpdate::Replace {
        key: key.to_string(),
        value,
    })
}

/// Server-side status of the query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MessageStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    /// Unrecognized status, kept verbatim
    Other(String),
}

impl MessageStatus {
    /// Parse a wire status tag (case-insensitive).
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "" | "PENDING" => MessageStatus::Pending,
            "IN_PROGRESS" | "INPROGRESS" | "RUNNING" => MessageStatus::InProgress,
            "COMPLETED" | "COMPLETE" | "DONE" => MessageStatus::Completed,
            _ => MessageStatus::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::InProgress => "in_progress",
            MessageStatus::Completed => "completed",
            MessageStatus::Other(raw) => raw,
        }
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw JSON shape of a stream message, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireMessage {
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub status: String,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub cursor: Option<String>,
    #[serde(default, deserialize_with = "deserialize_nullable_bool")]
    pub final_sse_message: bool,
    #[serde(default, deserialize_with = "deserialize_nullable_bool")]
    pub text_completed: bool,
    #[serde(default)]
    pub backend_uuid: Option<String>,
    #[serde(default)]
    pub thread_url_slug: Option<String>,
    #[serde(default)]
    pub blocks: Option<Vec<Value>>,
}

/// One decoded stream message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamMessage {
    pub status: MessageStatus,
    /// Sequence cursor, when the server sends one
    pub cursor: Option<String>,
    /// Whether this is the last message of the stream
    pub terminal: bool,
    pub text_completed: bool,
    pub backend_uuid: Option<String>,
    pub thread_url_slug: Option<String>,
    /// Blocks in wire order
    pub blocks: Vec<Block>,
}

impl TryFrom<WireMessage> for StreamMessage {
    type Error = ProtocolError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let mut blocks = Vec::new();
        for raw in wire.blocks.unwrap_or_default() {
            if let Some(block) = Block::from_wire(&raw)? {
                blocks.push(block);
            }
        }

        Ok(StreamMessage {
            status: MessageStatus::parse(&wire.status),
            cursor: wire.cursor,
            terminal: wire.final_sse_message,
            text_completed: wire.text_completed,
            backend_uuid: wire.backend_uuid,
            thread_url_slug: wire.thread_url_slug,
            blocks,
        })
    }
}
