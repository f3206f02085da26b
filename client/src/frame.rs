//! Decoding of streamed answer bodies.
//!
//! The answer endpoint replies with newline-delimited lines. Lines of the form
//! `data: {json}` carry exactly one of `chunk` (text increment), `done`
//! (completion) or `error` (inline failure). Everything else is ignored so new
//! line kinds can be added without breaking old clients.
//!
//! Decoding is best-effort per line: a malformed frame is skipped, it never
//! aborts an otherwise good answer.

use std::collections::VecDeque;
use std::pin::Pin;

use futures_util::{Stream, StreamExt, stream};
use serde_json::Value;

use crate::{ByteStream, ChatError};

/// Prefix marking a frame line. A single space after the colon is optional.
pub const FRAME_PREFIX: &str = "data:";

const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// Text increment to append to the answer.
    Chunk(String),
    /// The answer completed normally.
    Done,
    /// The backend failed while producing the answer.
    Error(String),
}

impl FrameEvent {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }
}

pub type FrameStream = Pin<Box<dyn Stream<Item = Result<FrameEvent, ChatError>> + Send>>;

/// Incremental line decoder.
///
/// Feed it raw reads in order; it returns the events completed by each read.
/// After the first terminal event it ignores all further input.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    discarding: bool,
    finished: bool,
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a `done` or `error` frame has been decoded.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<FrameEvent> {
        if self.finished {
            return Vec::new();
        }

        let mut input = bytes;
        if self.discarding {
            let Some(pos) = input.iter().position(|b| *b == b'\n') else {
                return Vec::new();
            };
            input = &input[pos + 1..];
            self.discarding = false;
        }
        self.buffer.extend_from_slice(input);

        let mut events = Vec::new();
        while let Some(line) = drain_next_line(&mut self.buffer) {
            let Some(event) = decode_line(&line) else {
                continue;
            };
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                self.finished = true;
                self.buffer.clear();
                return events;
            }
        }

        // Bound the partial line; the rest of it will be skipped up to its newline.
        if self.buffer.len() > MAX_LINE_BYTES {
            tracing::trace!(bytes = self.buffer.len(), "Discarding over-long frame line");
            self.buffer.clear();
            self.discarding = true;
        }

        events
    }

    /// Decode a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<FrameEvent> {
        if self.finished || self.discarding {
            self.buffer.clear();
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        let event = decode_line(&line)?;
        if event.is_terminal() {
            self.finished = true;
        }
        Some(event)
    }
}

fn drain_next_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let pos = buffer.iter().position(|b| *b == b'\n')?;
    let mut line: Vec<u8> = buffer.drain(..=pos).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(line)
}

fn decode_line(line: &[u8]) -> Option<FrameEvent> {
    if line.is_empty() {
        return None;
    }
    let Ok(line) = std::str::from_utf8(line) else {
        tracing::trace!(bytes = line.len(), "Skipping frame with invalid UTF-8");
        return None;
    };
    parse_frame_line(line)
}

/// Parse one complete line. Returns `None` for ignorable or malformed lines.
#[must_use]
pub fn parse_frame_line(line: &str) -> Option<FrameEvent> {
    let rest = line.strip_prefix(FRAME_PREFIX)?;
    let payload = rest.strip_prefix(' ').unwrap_or(rest);

    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::trace!(%e, payload_bytes = payload.len(), "Skipping malformed frame");
            return None;
        }
    };
    let object = value.as_object()?;

    let chunk = object.get("chunk");
    let done = object.get("done");
    let error = object.get("error");
    let present = [chunk, done, error].iter().filter(|v| v.is_some()).count();
    if present != 1 {
        tracing::trace!(keys = present, "Skipping frame without exactly one payload key");
        return None;
    }

    if let Some(chunk) = chunk {
        return chunk.as_str().map(|text| FrameEvent::Chunk(text.to_string()));
    }
    if done.is_some() {
        return Some(FrameEvent::Done);
    }
    error
        .and_then(Value::as_str)
        .map(|text| FrameEvent::Error(text.to_string()))
}

struct DecodeState {
    source: ByteStream,
    decoder: FrameDecoder,
    pending: VecDeque<FrameEvent>,
    ended: bool,
}

/// Turn a raw body into a lazy stream of frame events.
///
/// The stream ends after the first terminal event or when the body ends.
/// A body that ends without a terminal event simply ends; callers decide what
/// a missing `done` means. Transport failures are yielded once as `Err`.
#[must_use]
pub fn decode_frames(source: ByteStream) -> FrameStream {
    let state = DecodeState {
        source,
        decoder: FrameDecoder::new(),
        pending: VecDeque::new(),
        ended: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.ended || state.decoder.is_finished() {
                return None;
            }
            match state.source.next().await {
                Some(Ok(bytes)) => {
                    let events = state.decoder.feed(&bytes);
                    state.pending.extend(events);
                }
                Some(Err(e)) => {
                    state.ended = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.ended = true;
                    if let Some(event) = state.decoder.finish() {
                        state.pending.push_back(event);
                    }
                }
            }
        }
    }))
}
