//! SSE wire units.

/// Represents a parsed SSE line
#[derive(Debug, Clone, PartialEq)]
pub enum SseLine {
    /// Event name declaration (e.g., "event: message")
    Event(String),
    /// Data payload with exactly one leading space removed
    Data(String),
    /// Empty line - terminates the current frame
    Empty,
    /// Comment (`: keep-alive`) or any unrecognized directive
    Ignored,
}

/// One complete SSE frame: an optional event name and the joined data lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Value of the last `event:` line, if any
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`
    pub data: String,
}

impl RawFrame {
    /// Create a frame from its parts.
    pub fn new(event: Option<String>, data: impl Into<String>) -> Self {
        Self {
            event,
            data: data.into(),
        }
    }

    /// Whether the frame carries no payload at all.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
