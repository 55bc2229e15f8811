//! SSE (Server-Sent Events) framing
//!
//! The query endpoint answers with `text/event-stream`:
//! - `event: <name>` - event name line
//! - `data: <json>` - data payload line (may repeat)
//! - Empty line - closes the frame
//! - Lines starting with `:` and unknown directives - ignored
//!
//! # Module structure
//! - `events` - Wire units (`SseLine`, `RawFrame`)
//! - `lines` - Byte chunk to UTF-8 line splitting (`LineDecoder`)
//! - `reader` - Frame accumulation (`SseFrameReader`, `parse_sse_line`)

mod events;
mod lines;
mod reader;

pub use events::{RawFrame, SseLine};
pub use lines::{LineDecoder, MAX_LINE_BYTES};
pub use reader::{parse_sse_line, SseFrameReader};
