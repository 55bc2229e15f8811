//! Frame decoding: SSE frames in, stream messages out.

use std::collections::VecDeque;

use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, warn};

use crate::error::{excerpt, ProtocolError};
use crate::models::{StreamMessage, WireMessage};
use crate::sse::{LineDecoder, RawFrame, SseFrameReader};
use crate::traits::ByteStream;

/// Event name the server uses for message frames.
const MESSAGE_EVENT: &str = "message";

/// Decode one frame.
///
/// Returns `Ok(None)` for frames that carry no message: an empty data
/// payload, or an event other than `message`.
pub fn decode_frame(frame: &RawFrame) -> Result<Option<StreamMessage>, ProtocolError> {
    if let Some(event) = frame.event.as_deref() {
        if event != MESSAGE_EVENT {
            debug!(event, "Skipping non-message SSE frame");
            return Ok(None);
        }
    }
    if frame.data.trim().is_empty() {
        return Ok(None);
    }

    let wire: WireMessage = match serde_json::from_str(&frame.data) {
        Ok(wire) => wire,
        Err(e) => {
            warn!(error = %e, excerpt = %excerpt(&frame.data), "Malformed SSE payload");
            return Err(ProtocolError::malformed(e.to_string(), &frame.data));
        }
    };

    StreamMessage::try_from(wire).map(Some).map_err(|err| {
        warn!(error = %err, "Invalid stream message");
        err
    })
}

struct FrameState {
    bytes: ByteStream,
    lines: LineDecoder,
    reader: SseFrameReader,
    pending: VecDeque<String>,
    body_done: bool,
}

/// Turn a response body into the ordered stream of its messages.
///
/// The stream ends after the first error. Dropping it drops the body,
/// which closes the connection.
pub fn message_stream(
    bytes: ByteStream,
) -> impl Stream<Item = Result<StreamMessage, ProtocolError>> + Send {
    let state = FrameState {
        bytes,
        lines: LineDecoder::new(),
        reader: SseFrameReader::new(),
        pending: VecDeque::new(),
        body_done: false,
    };

    stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        loop {
            // First, drain any complete lines already buffered
            while let Some(line) = state.pending.pop_front() {
                if let Some(frame) = state.reader.feed(&line) {
                    match decode_frame(&frame) {
                        Ok(Some(message)) => return Some((Ok(message), Some(state))),
                        Ok(None) => continue,
                        Err(e) => return Some((Err(e), None)),
                    }
                }
            }

            if state.body_done {
                // Body ended mid-frame: flush what the reader holds
                return match state.reader.finish().map(|frame| decode_frame(&frame)) {
                    Some(Ok(Some(message))) => Some((Ok(message), None)),
                    Some(Err(e)) => Some((Err(e), None)),
                    Some(Ok(None)) | None => None,
                };
            }

            // Need more data from the body
            match state.bytes.next().await {
                Some(Ok(chunk)) => match state.lines.push(&chunk) {
                    Ok(lines) => state.pending.extend(lines),
                    Err(e) => return Some((Err(e), None)),
                },
                Some(Err(e)) => return Some((Err(ProtocolError::from(e)), None)),
                None => {
                    match state.lines.finish() {
                        Ok(Some(line)) => state.pending.push_back(line),
                        Ok(None) => {}
                        Err(e) => return Some((Err(e), None)),
                    }
                    state.body_done = true;
                }
            }
        }
    })
}
