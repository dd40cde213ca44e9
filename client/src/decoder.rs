//! Reassembles [`WireEvent`]s from a response body that arrives in arbitrary
//! byte chunks.
//!
//! Bytes are decoded to text incrementally (a multi-byte character split
//! across reads is held back until complete), appended to a line buffer, and
//! every complete line is parsed on its own. The last, possibly incomplete,
//! line stays in the buffer until more bytes arrive.

use std::collections::VecDeque;

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use tracing::{debug, warn};

use crate::errors::{ClientError, DecodeError};
use crate::models::WireEvent;

/// Prefix of lines that carry an event payload. Other lines are ignored.
pub const DATA_PREFIX: &str = "data:";

#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Bytes of a UTF-8 sequence cut off at the end of the previous read.
    utf8_tail: Vec<u8>,
    /// Text not yet terminated by a line break.
    buffer: String,
    /// The last line ended in `\r`; a `\n` right after it belongs to the same break.
    after_cr: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one read and returns the outcome of every line it completed, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<WireEvent, DecodeError>> {
        self.decode_utf8(bytes);

        let mut events = Vec::new();
        loop {
            if self.after_cr && !self.buffer.is_empty() {
                if self.buffer.starts_with('\n') {
                    self.buffer.remove(0);
                }
                self.after_cr = false;
            }
            // Lines end in `\n`, `\r\n` or a lone `\r`.
            let Some(pos) = self.buffer.find(['\r', '\n']) else { break };
            self.after_cr = self.buffer.as_bytes()[pos] == b'\r';
            let line: String = self.buffer.drain(..=pos).collect();
            if let Some(result) = parse_line(&line[..pos]) {
                events.push(result);
            }
        }
        events
    }

    /// Ends decoding. Whatever is left is an incomplete line and is dropped;
    /// returns true if anything was discarded.
    pub fn finish(&mut self) -> bool {
        let discarded = !self.buffer.is_empty() || !self.utf8_tail.is_empty();
        self.buffer.clear();
        self.utf8_tail.clear();
        self.after_cr = false;
        discarded
    }

    /// Text currently held as an incomplete line.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    fn decode_utf8(&mut self, bytes: &[u8]) {
        let mut input = std::mem::take(&mut self.utf8_tail);
        input.extend_from_slice(bytes);

        let mut rest = input.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    self.buffer.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        // Invalid sequence in the middle: replace and keep going.
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        // Truncated sequence at the end: wait for the next read.
                        None => {
                            self.utf8_tail = after.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Parses one complete line. `None` for lines that are not event data
/// (blank separators, comments, keep-alives, other fields).
pub fn parse_line(line: &str) -> Option<Result<WireEvent, DecodeError>> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    Some(serde_json::from_str(payload).map_err(|e| DecodeError::InvalidPayload {
        line: line.to_string(),
        message: e.to_string(),
    }))
}

struct DecodeState<S> {
    bytes: S,
    decoder: StreamDecoder,
    ready: VecDeque<WireEvent>,
    finished: bool,
}

/// Lazily turns a byte stream into wire events.
///
/// Malformed lines are logged and skipped. A transport error is yielded once
/// and ends the sequence. The sequence is single-pass.
pub fn decode_events<S>(bytes: S) -> impl Stream<Item = Result<WireEvent, ClientError>>
where
    S: Stream<Item = Result<Bytes, ClientError>> + Unpin,
{
    let state = DecodeState {
        bytes,
        decoder: StreamDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.ready.pop_front() {
                return Some((Ok(event), state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for result in state.decoder.push(&chunk) {
                        match result {
                            Ok(event) => state.ready.push_back(event),
                            Err(e) => warn!("Skipping malformed event line: {e}"),
                        }
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    state.decoder.finish();
                    return Some((Err(e), state));
                }
                None => {
                    state.finished = true;
                    if state.decoder.finish() {
                        debug!("Discarded incomplete line at end of stream");
                    }
                }
            }
        }
    })
}
