pub mod pipeline;
pub mod sink;
pub mod sse;
pub mod transcoder;

pub use pipeline::{transcode_sse_stream, PipelineOptions};
pub use sink::{EventSink, FrameQueue, WriterSink};
pub use sse::{sse_frame_stream, SseParser};
pub use transcoder::{StreamOptions, StreamTranscoder};

/// A parsed SSE frame from the upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}
