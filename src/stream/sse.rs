/// SSE (Server-Sent Events) frame parser and byte-stream adapter for the
/// upstream side.
///
/// Handles buffering of partial lines and the field semantics of the
/// [SSE specification](https://html.spec.whatwg.org/multipage/server-sent-events.html)
/// that chat-completion providers actually use (`event`, `data`, comments).
use super::SseEvent;
use crate::error::TranscodeError;
use futures_util::Stream;
use memchr::memchr_iter;
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// SseParser — incremental SSE line parser
// ---------------------------------------------------------------------------

/// Incremental SSE line parser.
///
/// Feed it raw text chunks (potentially arriving in arbitrary byte
/// boundaries) and it yields fully-assembled [`SseEvent`] frames.
pub struct SseParser {
    buffer: String,
    read_offset: usize,
    event_type: Option<String>,
    data_buffer: String,
    has_data: bool,
}

impl SseParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            read_offset: 0,
            event_type: None,
            data_buffer: String::new(),
            has_data: false,
        }
    }

    /// Feed raw text and return any complete events parsed.
    ///
    /// - `event:` sets the event type for the next frame
    /// - `data:` appends to the data buffer (one leading space stripped);
    ///   several `data:` lines are joined with `\n`
    /// - an empty line terminates the frame
    /// - `:` comments and unknown fields are ignored
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        let mut out = Vec::new();
        self.feed_into(chunk, &mut out);
        out
    }

    /// Feed raw text and append complete events into a caller-provided buffer.
    pub fn feed_into(&mut self, chunk: &str, out: &mut Vec<SseEvent>) {
        self.buffer.push_str(chunk);
        let mut processed_up_to = self.read_offset;
        let scan_start = processed_up_to;
        let bytes = self.buffer.as_bytes();
        for rel_pos in memchr_iter(b'\n', &bytes[scan_start..]) {
            let line_end = scan_start + rel_pos;
            let mut line = &self.buffer[processed_up_to..line_end];
            if let Some(stripped) = line.strip_suffix('\r') {
                line = stripped;
            }
            Self::process_line(
                line,
                &mut self.event_type,
                &mut self.data_buffer,
                &mut self.has_data,
                out,
            );
            processed_up_to = line_end + 1;
        }

        self.read_offset = processed_up_to;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }
        let should_compact = self.read_offset > 0
            && (self.read_offset >= self.buffer.len() / 2 || self.read_offset >= 8 * 1024);
        if should_compact {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }

    /// Dispatch a frame left unterminated at end of input.
    ///
    /// Some upstreams close the connection right after the last `data:` line
    /// without the blank separator.
    pub fn finish_into(&mut self, out: &mut Vec<SseEvent>) {
        let tail = std::mem::take(&mut self.buffer);
        let start = std::mem::take(&mut self.read_offset);
        let line = tail[start..].strip_suffix('\r').unwrap_or(&tail[start..]);
        if !line.is_empty() {
            Self::process_line(
                line,
                &mut self.event_type,
                &mut self.data_buffer,
                &mut self.has_data,
                out,
            );
        }
        Self::process_line(
            "",
            &mut self.event_type,
            &mut self.data_buffer,
            &mut self.has_data,
            out,
        );
    }

    fn process_line(
        line: &str,
        event_type: &mut Option<String>,
        data_buffer: &mut String,
        has_data: &mut bool,
        events: &mut Vec<SseEvent>,
    ) {
        if line.is_empty() {
            if *has_data {
                events.push(SseEvent {
                    event: event_type.take(),
                    data: std::mem::take(data_buffer),
                });
                *has_data = false;
            }
            return;
        }

        if line.starts_with(':') {
            return;
        }

        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            if *has_data {
                data_buffer.push('\n');
            } else {
                *has_data = true;
            }
            data_buffer.push_str(value);
        } else if let Some(value) = line.strip_prefix("event:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            *event_type = Some(value.to_string());
        }
    }
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Stream utility
// ---------------------------------------------------------------------------

struct FrameState<S> {
    stream: std::pin::Pin<Box<S>>,
    parser: SseParser,
    remainder: Vec<u8>,
    parsed: Vec<SseEvent>,
    pending: VecDeque<SseEvent>,
    done: bool,
}

impl<S> FrameState<S> {
    /// Feed bytes, keeping an incomplete UTF-8 sequence for the next chunk.
    fn feed_bytes(&mut self, bytes: &[u8]) {
        self.remainder.extend_from_slice(bytes);
        let valid_up_to = match std::str::from_utf8(&self.remainder) {
            Ok(text) => {
                self.parser.feed_into(text, &mut self.parsed);
                self.remainder.len()
            }
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                if let Ok(text) = std::str::from_utf8(&self.remainder[..valid_up_to]) {
                    self.parser.feed_into(text, &mut self.parsed);
                }
                valid_up_to
            }
        };
        self.remainder.drain(..valid_up_to);
        self.pending.extend(self.parsed.drain(..));
    }
}

/// Split an upstream byte stream into SSE events using [`SseParser`].
///
/// Bytes are decoded as UTF-8 (sequences split across chunks are carried
/// over) and complete events are yielded in order. A transport error is
/// yielded once as [`TranscodeError::Upstream`] and ends the stream; events
/// completed before the error are yielded first.
pub fn sse_frame_stream<S, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<SseEvent, TranscodeError>> + Send
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    use futures_util::StreamExt;

    let state = FrameState {
        stream: Box::pin(byte_stream),
        parser: SseParser::new(),
        remainder: Vec::new(),
        parsed: Vec::with_capacity(8),
        pending: VecDeque::with_capacity(8),
        done: false,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.done {
                return None;
            }

            match state.stream.as_mut().next().await {
                Some(Ok(bytes)) => state.feed_bytes(&bytes),
                Some(Err(err)) => {
                    state.done = true;
                    return Some((Err(TranscodeError::Upstream(err.to_string())), state));
                }
                None => {
                    state.done = true;
                    if !state.remainder.is_empty() {
                        let lossy = String::from_utf8_lossy(&state.remainder).into_owned();
                        state.remainder.clear();
                        state.parser.feed_into(&lossy, &mut state.parsed);
                    }
                    state.parser.finish_into(&mut state.parsed);
                    state.pending.extend(state.parsed.drain(..));
                }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
