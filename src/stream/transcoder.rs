use std::sync::Arc;

use super::sink::EventSink;
use crate::error::TranscodeError;
use crate::protocol::anthropic::stream::{
    encode_block_start_frame, encode_block_stop_frame, encode_message_delta_frame,
    encode_message_start_frame, encode_message_stop_frame, encode_text_delta_frame,
};
use crate::protocol::anthropic::EventKind;
use crate::protocol::canonical::{UpstreamItem, UpstreamUsage};
use crate::reasoning::{classify, classify_final, Mode, PieceKind, ReasoningMarkers, ScanState};

/// Per-response settings for [`StreamTranscoder::start`].
#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub message_id: String,
    pub model: String,
    pub markers: Arc<ReasoningMarkers>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Streaming,
    Finished,
}

#[derive(Debug)]
struct StreamState {
    scan: ScanState,
    /// Tail of the previous fragment that may begin a marker.
    carry: String,
    block_opened: bool,
    block_index: usize,
    reasoning: String,
    input_tokens: u64,
    output_tokens: u64,
    phase: Phase,
    stray_logged: bool,
}

impl StreamState {
    fn new() -> Self {
        Self {
            scan: ScanState::default(),
            carry: String::new(),
            block_opened: false,
            block_index: 0,
            reasoning: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            phase: Phase::Streaming,
            stray_logged: false,
        }
    }
}

/// Translates one upstream response, fragment by fragment, into Messages
/// stream events written to an [`EventSink`].
///
/// Visible text is forwarded as soon as it is classified. Reasoning text is
/// accumulated and emitted as a single delta when its segment closes (or at
/// [`finish`](Self::finish) if the stream ends inside it). All deltas share
/// one text block, opened lazily before the first delta.
///
/// A transcoder is owned by one task and driven sequentially; it never
/// blocks and never reorders frames.
pub struct StreamTranscoder<S: EventSink> {
    sink: S,
    markers: Arc<ReasoningMarkers>,
    message_id: String,
    model: String,
    state: StreamState,
    frame: String,
}

impl<S: EventSink> StreamTranscoder<S> {
    /// Create the transcoder and emit `message_start`.
    pub fn start(sink: S, opts: StreamOptions) -> Result<Self, TranscodeError> {
        let mut transcoder = Self {
            sink,
            markers: opts.markers,
            message_id: opts.message_id,
            model: opts.model,
            state: StreamState::new(),
            frame: String::with_capacity(256),
        };
        encode_message_start_frame(
            &mut transcoder.frame,
            &transcoder.message_id,
            &transcoder.model,
        );
        transcoder.write(EventKind::MessageStart)?;
        tracing::debug!(
            message_id = %transcoder.message_id,
            model = %transcoder.model,
            "stream started"
        );
        Ok(transcoder)
    }

    /// Feed one upstream text fragment.
    pub fn handle_fragment(&mut self, fragment: &str) -> Result<(), TranscodeError> {
        self.ensure_streaming()?;
        if fragment.is_empty() {
            return Ok(());
        }

        if self.state.carry.is_empty() {
            let pending_len = self.process(fragment, false)?;
            self.state
                .carry
                .push_str(&fragment[fragment.len() - pending_len..]);
            return Ok(());
        }

        let mut text = std::mem::take(&mut self.state.carry);
        text.push_str(fragment);
        let result = self.process(&text, false);
        if let Ok(pending_len) = result {
            text.drain(..text.len() - pending_len);
            self.state.carry = text;
        }
        result.map(|_| ())
    }

    /// Record the upstream token counts. Missing counters count as zero and
    /// a later report replaces an earlier one.
    pub fn handle_usage(&mut self, usage: UpstreamUsage) -> Result<(), TranscodeError> {
        self.ensure_streaming()?;
        self.state.input_tokens = usage.input_tokens();
        self.state.output_tokens = usage.output_tokens();
        Ok(())
    }

    /// Dispatch a decoded upstream item.
    pub fn handle_item(&mut self, item: UpstreamItem) -> Result<(), TranscodeError> {
        match item {
            UpstreamItem::Fragment(text) => self.handle_fragment(&text),
            UpstreamItem::Usage(usage) => self.handle_usage(usage),
        }
    }

    /// Emit the terminal events and close the sink.
    ///
    /// Runs at most once; later calls return [`TranscodeError::StreamClosed`]
    /// without writing anything. The stream counts as finished even if a
    /// write fails part way.
    pub fn finish(&mut self) -> Result<(), TranscodeError> {
        self.ensure_streaming()?;
        self.state.phase = Phase::Finished;

        if !self.state.carry.is_empty() {
            let carry = std::mem::take(&mut self.state.carry);
            self.process(&carry, true)?;
        }

        if self.state.scan.mode == Mode::InReasoning && !self.state.reasoning.is_empty() {
            tracing::debug!(
                message_id = %self.message_id,
                reasoning_bytes = self.state.reasoning.len(),
                "stream ended inside reasoning; flushing"
            );
            self.flush_reasoning()?;
        }

        if self.state.block_opened {
            encode_block_stop_frame(&mut self.frame, self.state.block_index);
            self.write(EventKind::ContentBlockStop)?;
        }
        encode_message_delta_frame(&mut self.frame, self.state.output_tokens);
        self.write(EventKind::MessageDelta)?;
        encode_message_stop_frame(&mut self.frame);
        self.write(EventKind::MessageStop)?;

        self.sink.close().map_err(TranscodeError::emission)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.phase == Phase::Finished
    }

    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn input_tokens(&self) -> u64 {
        self.state.input_tokens
    }

    #[must_use]
    pub fn output_tokens(&self) -> u64 {
        self.state.output_tokens
    }

    /// Whether a content block has been opened (at least one delta written).
    #[must_use]
    pub fn block_opened(&self) -> bool {
        self.state.block_opened
    }

    #[must_use]
    pub fn scan_state(&self) -> ScanState {
        self.state.scan
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn ensure_streaming(&self) -> Result<(), TranscodeError> {
        match self.state.phase {
            Phase::Streaming => Ok(()),
            Phase::Finished => Err(TranscodeError::StreamClosed),
        }
    }

    /// Classify `text` from the current scan state and emit its pieces.
    /// Returns the number of trailing bytes held back.
    fn process(&mut self, text: &str, last: bool) -> Result<usize, TranscodeError> {
        let classified = if last {
            classify_final(text, self.state.scan, &self.markers)
        } else {
            classify(text, self.state.scan, &self.markers)
        };
        self.state.scan = classified.state;

        if classified.stray_end_marker && !self.state.stray_logged {
            self.state.stray_logged = true;
            tracing::debug!(
                message_id = %self.message_id,
                end_marker = self.markers.end(),
                "unmatched reasoning end marker kept as text"
            );
        }

        for piece in &classified.pieces {
            match piece.kind {
                PieceKind::Visible => {
                    if !piece.text.is_empty() {
                        self.emit_delta(piece.text)?;
                    }
                }
                PieceKind::Reasoning => {
                    self.state.reasoning.push_str(piece.text);
                    if piece.closes_segment {
                        self.flush_reasoning()?;
                    }
                }
            }
        }
        Ok(classified.pending_len)
    }

    /// Emit the accumulated reasoning as one delta, if any, and clear it.
    fn flush_reasoning(&mut self) -> Result<(), TranscodeError> {
        let mut reasoning = std::mem::take(&mut self.state.reasoning);
        let result = if reasoning.is_empty() {
            Ok(())
        } else {
            self.emit_delta(&reasoning)
        };
        reasoning.clear();
        self.state.reasoning = reasoning;
        result
    }

    /// Shared path for every delta: opens the block on first use.
    fn emit_delta(&mut self, text: &str) -> Result<(), TranscodeError> {
        if !self.state.block_opened {
            encode_block_start_frame(&mut self.frame, self.state.block_index);
            self.write(EventKind::ContentBlockStart)?;
            self.state.block_opened = true;
        }
        encode_text_delta_frame(&mut self.frame, self.state.block_index, text);
        self.write(EventKind::ContentBlockDelta)
    }

    #[inline]
    fn write(&mut self, kind: EventKind) -> Result<(), TranscodeError> {
        self.sink
            .write_frame(kind, &self.frame)
            .map_err(TranscodeError::emission)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
