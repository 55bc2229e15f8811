//! Stateful SSE frame reader.
//!
//! Accumulates `event:` and `data:` lines until a blank line closes the
//! frame. The reader never decodes payloads; turning a frame's data into a
//! stream message is the caller's job.

use crate::sse::events::{RawFrame, SseLine};

/// Parse a single SSE line into its component type
pub fn parse_sse_line(line: &str) -> SseLine {
    if line.is_empty() {
        return SseLine::Empty;
    }

    if line.starts_with(':') {
        return SseLine::Ignored;
    }

    if let Some(rest) = line.strip_prefix("event:") {
        return SseLine::Event(rest.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("data:") {
        let value = rest.strip_prefix(' ').unwrap_or(rest);
        return SseLine::Data(value.to_string());
    }

    // Unknown directives (id:, retry:, anything else) must not abort parsing
    SseLine::Ignored
}

/// Stateful SSE reader that accumulates lines and emits complete frames
#[derive(Debug, Default)]
pub struct SseFrameReader {
    /// Pending event name
    event: Option<String>,
    /// Pending data lines (SSE allows multiple data: lines per frame)
    data_lines: Vec<String>,
}

impl SseFrameReader {
    /// Create a new reader
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its line terminator) to the reader.
    ///
    /// Returns the completed frame when `line` is the blank terminator of a
    /// non-empty frame. Keep-alive blank lines with nothing buffered return
    /// `None`.
    pub fn feed(&mut self, line: &str) -> Option<RawFrame> {
        match parse_sse_line(line) {
            SseLine::Event(name) => {
                self.event = Some(name);
                None
            }
            SseLine::Data(data) => {
                self.data_lines.push(data);
                None
            }
            SseLine::Empty => self.take_frame(),
            SseLine::Ignored => None,
        }
    }

    /// Flush a frame left open when the transport ended without a final
    /// blank line.
    pub fn finish(&mut self) -> Option<RawFrame> {
        self.take_frame()
    }

    /// Whether nothing is buffered.
    pub fn is_idle(&self) -> bool {
        self.event.is_none() && self.data_lines.is_empty()
    }

    /// Discard any partially accumulated frame
    pub fn reset(&mut self) {
        self.event = None;
        self.data_lines.clear();
    }

    fn take_frame(&mut self) -> Option<RawFrame> {
        if self.is_idle() {
            return None;
        }

        let event = self.event.take();
        let data = self.data_lines.join("\n");
        self.data_lines.clear();
        Some(RawFrame::new(event, data))
    }
}
