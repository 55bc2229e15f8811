//! Byte-to-line splitting for streamed response bodies.
//!
//! Chunks arrive with arbitrary boundaries, including in the middle of a
//! multi-byte UTF-8 sequence, so bytes are buffered until a full line is
//! available and only then decoded.

use crate::error::ProtocolError;

/// Longest line accepted, in bytes. A full answer snapshot travels on one
/// `data:` line, so this is generous.
pub const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Splits a byte stream into UTF-8 lines, stripping `\n` and `\r\n`.
#[derive(Debug)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    max_line: usize,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl LineDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder that rejects lines longer than `max_line` bytes.
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line,
        }
    }

    /// Append a chunk and return every line it completed.
    ///
    /// Fails with `MalformedFrame` once a line, complete or not, exceeds
    /// the maximum length.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, ProtocolError> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            self.check_length(end - start)?;
            lines.push(decode_line(&self.buffer[start..end])?);
            start = end + 1;
        }
        self.buffer.drain(..start);
        self.check_length(self.buffer.len())?;

        Ok(lines)
    }

    fn check_length(&self, len: usize) -> Result<(), ProtocolError> {
        if len <= self.max_line {
            return Ok(());
        }
        let head = &self.buffer[..self.buffer.len().min(64)];
        Err(ProtocolError::malformed(
            format!("line exceeds {} bytes", self.max_line),
            &String::from_utf8_lossy(head),
        ))
    }

    /// Return whatever remains once the body has ended.
    pub fn finish(&mut self) -> Result<Option<String>, ProtocolError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest).map(Some)
    }
}

fn decode_line(bytes: &[u8]) -> Result<String, ProtocolError> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(line) => Ok(line.to_string()),
        Err(_) => Err(ProtocolError::malformed(
            "invalid UTF-8",
            &String::from_utf8_lossy(bytes),
        )),
    }
}
