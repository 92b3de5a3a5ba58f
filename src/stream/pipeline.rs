use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use super::sink::FrameQueue;
use super::sse::sse_frame_stream;
use super::transcoder::{StreamOptions, StreamTranscoder};
use super::SseEvent;
use crate::error::TranscodeError;
use crate::observability::log_stream_complete;
use crate::protocol::canonical::UpstreamItem;
use crate::protocol::openai_chat::stream::{
    parse_openai_sse_data, OpenAiStreamDecoder, UpstreamFrame,
};
use crate::reasoning::ReasoningMarkers;

/// Settings for one piped response.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub markers: Arc<ReasoningMarkers>,
    /// Model reported when the upstream never names one (or echoing is off).
    pub default_model: String,
    pub echo_upstream_model: bool,
    pub message_id: String,
    /// Emit the terminal events when the upstream fails mid-stream.
    pub finish_on_abort: bool,
}

struct PipelineState<F> {
    frames: Pin<Box<F>>,
    decoder: OpenAiStreamDecoder,
    transcoder: Option<StreamTranscoder<FrameQueue>>,
    opts: PipelineOptions,
    items: Vec<UpstreamItem>,
    error: Option<TranscodeError>,
    done: bool,
    started_at: Instant,
}

impl<F> PipelineState<F> {
    /// Start the transcoder on the first upstream event. The model named by
    /// that event wins when echoing is enabled.
    fn ensure_started(&mut self, upstream_model: Option<&str>) -> Result<(), TranscodeError> {
        if self.transcoder.is_some() {
            return Ok(());
        }
        let model = match upstream_model {
            Some(model) if self.opts.echo_upstream_model && !model.is_empty() => model,
            _ => self.opts.default_model.as_str(),
        };
        let transcoder = StreamTranscoder::start(
            FrameQueue::new(),
            StreamOptions {
                message_id: self.opts.message_id.clone(),
                model: model.to_owned(),
                markers: Arc::clone(&self.opts.markers),
            },
        )?;
        self.transcoder = Some(transcoder);
        Ok(())
    }

    fn feed_items(&mut self) -> Result<(), TranscodeError> {
        let Some(transcoder) = self.transcoder.as_mut() else {
            self.items.clear();
            return Ok(());
        };
        for item in self.items.drain(..) {
            transcoder.handle_item(item)?;
        }
        Ok(())
    }

    fn handle_event(&mut self, event: &SseEvent) -> Result<(), TranscodeError> {
        match parse_openai_sse_data(&event.data) {
            UpstreamFrame::Chunk(chunk) => {
                self.ensure_started(chunk.model.as_deref())?;
                self.decoder.decode_into(*chunk, &mut self.items);
                self.feed_items()
            }
            UpstreamFrame::Done => self.complete(),
            UpstreamFrame::Ignored => Ok(()),
        }
    }

    /// Close any open reasoning run, finish the transcoder and log usage.
    fn complete(&mut self) -> Result<(), TranscodeError> {
        self.done = true;
        self.ensure_started(None)?;
        self.decoder.finish_into(&mut self.items);
        self.feed_items()?;
        let Some(transcoder) = self.transcoder.as_mut() else {
            return Ok(());
        };
        transcoder.finish()?;
        log_stream_complete(
            transcoder.model(),
            transcoder.input_tokens(),
            transcoder.output_tokens(),
            self.started_at,
        );
        Ok(())
    }

    fn abort(&mut self, err: TranscodeError) {
        self.done = true;
        tracing::warn!(error = %err, "upstream stream aborted");
        if self.opts.finish_on_abort {
            if let Err(finish_err) = self.complete() {
                tracing::debug!(error = %finish_err, "failed to finish aborted stream");
            }
        }
        self.error = Some(err);
    }

    fn next_frame(&mut self) -> Option<Bytes> {
        self.transcoder.as_mut()?.sink_mut().pop()
    }
}

/// Translate an upstream chat-completion SSE byte stream into Messages SSE
/// frames.
///
/// The transcoder starts on the first upstream event and finishes on
/// `[DONE]` or at end of input. A transport error ends the output with
/// [`TranscodeError::Upstream`], preceded by the terminal events when
/// `finish_on_abort` is set. An error raised by the transcoder itself is
/// yielded after the frames produced before it.
pub fn transcode_sse_stream<S, E>(
    byte_stream: S,
    opts: PipelineOptions,
) -> impl Stream<Item = Result<Bytes, TranscodeError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let decoder = OpenAiStreamDecoder::new(Arc::clone(&opts.markers));
    let state = PipelineState {
        frames: Box::pin(sse_frame_stream(byte_stream)),
        decoder,
        transcoder: None,
        opts,
        items: Vec::with_capacity(4),
        error: None,
        done: false,
        started_at: Instant::now(),
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.next_frame() {
                return Some((Ok(frame), state));
            }
            if let Some(err) = state.error.take() {
                return Some((Err(err), state));
            }
            if state.done {
                return None;
            }

            let step = match state.frames.next().await {
                Some(Ok(event)) => state.handle_event(&event),
                Some(Err(err)) => {
                    state.abort(err);
                    Ok(())
                }
                None => state.complete(),
            };
            if let Err(err) = step {
                state.done = true;
                state.error = Some(err);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> PipelineOptions {
        PipelineOptions {
            markers: ReasoningMarkers::think(),
            default_model: "fallback".to_string(),
            echo_upstream_model: true,
            message_id: "msg_p".to_string(),
            finish_on_abort: true,
        }
    }

    async fn collect_text(
        chunks: Vec<Result<Bytes, &'static str>>,
        opts: PipelineOptions,
    ) -> (String, Option<TranscodeError>) {
        let mut out = String::new();
        let mut error = None;
        let stream = transcode_sse_stream(futures_util::stream::iter(chunks), opts);
        futures_util::pin_mut!(stream);
        while let Some(item) = stream.next().await {
            match item {
                Ok(frame) => out.push_str(std::str::from_utf8(&frame).expect("utf8")),
                Err(err) => error = Some(err),
            }
        }
        (out, error)
    }

    #[tokio::test]
    async fn echoes_upstream_model() {
        let (out, error) = collect_text(
            vec![
                Ok(Bytes::from_static(
                    b"data: {\"model\":\"up-model\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"hi\"}}]}\n\n",
                )),
                Ok(Bytes::from_static(b"data: [DONE]\n\n")),
            ],
            opts(),
        )
        .await;
        assert!(error.is_none());
        assert!(out.contains("\"model\":\"up-model\""));
        assert!(out.ends_with("event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n"));
    }

    #[tokio::test]
    async fn default_model_when_echo_disabled() {
        let (out, _) = collect_text(
            vec![Ok(Bytes::from_static(
                b"data: {\"model\":\"up-model\",\"choices\":[]}\n\n",
            ))],
            PipelineOptions {
                echo_upstream_model: false,
                ..opts()
            },
        )
        .await;
        assert!(out.contains("\"model\":\"fallback\""));
        assert!(out.contains("event: message_stop"));
    }

    #[tokio::test]
    async fn empty_upstream_still_yields_lifecycle() {
        let (out, error) = collect_text(Vec::new(), opts()).await;
        assert!(error.is_none());
        assert_eq!(out.matches("event: ").count(), 3);
        assert!(out.contains("\"model\":\"fallback\""));
    }

    #[tokio::test]
    async fn abort_without_finish_yields_only_error() {
        let (out, error) = collect_text(
            vec![
                Ok(Bytes::from_static(
                    b"data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"partial\"}}]}\n\n",
                )),
                Err("reset by peer"),
            ],
            PipelineOptions {
                finish_on_abort: false,
                ..opts()
            },
        )
        .await;
        assert!(out.contains("partial"));
        assert!(!out.contains("message_stop"));
        assert!(matches!(error, Some(TranscodeError::Upstream(_))));
    }
}
