use std::sync::Arc;

use super::OpenAiStreamChunk;
use crate::protocol::canonical::UpstreamItem;
use crate::reasoning::ReasoningMarkers;
use crate::util::extract_sse_data_payload;

/// One parsed `data:` payload of an upstream chat-completion stream.
#[derive(Debug, Clone)]
pub enum UpstreamFrame {
    Chunk(Box<OpenAiStreamChunk>),
    /// The `[DONE]` sentinel.
    Done,
    /// Comment, blank, or unparsable payload.
    Ignored,
}

/// Parse the data of one SSE event from the upstream.
#[must_use]
pub fn parse_openai_sse_data(data: &str) -> UpstreamFrame {
    if data.trim() == "[DONE]" {
        return UpstreamFrame::Done;
    }
    let Some(payload) = extract_sse_data_payload(data) else {
        return UpstreamFrame::Ignored;
    };
    match serde_json::from_str::<OpenAiStreamChunk>(payload) {
        Ok(chunk) => UpstreamFrame::Chunk(Box::new(chunk)),
        Err(err) => {
            tracing::debug!(error = %err, "skipping unparsable upstream chunk");
            UpstreamFrame::Ignored
        }
    }
}

/// Stateful decoder from upstream chunks to fragments and usage records.
///
/// Providers that stream reasoning through a separate `reasoning_content`
/// field get that text wrapped in the reasoning markers, so downstream sees a
/// single text channel. The wrap opens on the first reasoning delta of a run
/// and closes when answer content arrives or the stream ends.
pub struct OpenAiStreamDecoder {
    markers: Arc<ReasoningMarkers>,
    in_reasoning_content: bool,
}

impl OpenAiStreamDecoder {
    #[must_use]
    pub fn new(markers: Arc<ReasoningMarkers>) -> Self {
        Self {
            markers,
            in_reasoning_content: false,
        }
    }

    /// Decode one chunk. Only the first choice is translated.
    pub fn decode_into(&mut self, chunk: OpenAiStreamChunk, out: &mut Vec<UpstreamItem>) {
        if let Some(choice) = chunk.choices.into_iter().find(|c| c.index == 0) {
            if let Some(reasoning) = choice.delta.reasoning_content {
                if !reasoning.is_empty() {
                    if self.in_reasoning_content {
                        out.push(UpstreamItem::Fragment(reasoning));
                    } else {
                        self.in_reasoning_content = true;
                        let mut text =
                            String::with_capacity(self.markers.start().len() + reasoning.len());
                        text.push_str(self.markers.start());
                        text.push_str(&reasoning);
                        out.push(UpstreamItem::Fragment(text));
                    }
                }
            }

            if let Some(content) = choice.delta.content {
                if !content.is_empty() {
                    if self.in_reasoning_content {
                        self.in_reasoning_content = false;
                        let mut text =
                            String::with_capacity(self.markers.end().len() + content.len());
                        text.push_str(self.markers.end());
                        text.push_str(&content);
                        out.push(UpstreamItem::Fragment(text));
                    } else {
                        out.push(UpstreamItem::Fragment(content));
                    }
                }
            }
        }

        if let Some(usage) = chunk.usage {
            out.push(UpstreamItem::Usage(usage.into()));
        }
    }

    /// Close a `reasoning_content` run left open at end of stream.
    pub fn finish_into(&mut self, out: &mut Vec<UpstreamItem>) {
        if std::mem::take(&mut self.in_reasoning_content) {
            out.push(UpstreamItem::Fragment(self.markers.end().to_owned()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::canonical::UpstreamUsage;

    fn chunk(json: serde_json::Value) -> OpenAiStreamChunk {
        serde_json::from_value(json).expect("wire parse")
    }

    fn fragments(items: &[UpstreamItem]) -> Vec<&str> {
        items
            .iter()
            .filter_map(|item| match item {
                UpstreamItem::Fragment(text) => Some(text.as_str()),
                UpstreamItem::Usage(_) => None,
            })
            .collect()
    }

    #[test]
    fn parse_done_and_garbage() {
        assert!(matches!(parse_openai_sse_data("[DONE]"), UpstreamFrame::Done));
        assert!(matches!(parse_openai_sse_data("{not json"), UpstreamFrame::Ignored));
        assert!(matches!(parse_openai_sse_data(""), UpstreamFrame::Ignored));
        assert!(matches!(
            parse_openai_sse_data("{\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}"),
            UpstreamFrame::Chunk(_)
        ));
    }

    #[test]
    fn content_deltas_become_fragments() {
        let mut decoder = OpenAiStreamDecoder::new(ReasoningMarkers::think());
        let mut out = Vec::new();
        decoder.decode_into(
            chunk(serde_json::json!({
                "id": "chatcmpl-1",
                "model": "m",
                "choices": [{"index": 0, "delta": {"role": "assistant", "content": "<think>Step "}}]
            })),
            &mut out,
        );
        decoder.decode_into(
            chunk(serde_json::json!({
                "choices": [{"index": 0, "delta": {"content": ""}}]
            })),
            &mut out,
        );
        assert_eq!(fragments(&out), vec!["<think>Step "]);
    }

    #[test]
    fn usage_chunk_without_choices() {
        let mut decoder = OpenAiStreamDecoder::new(ReasoningMarkers::think());
        let mut out = Vec::new();
        decoder.decode_into(
            chunk(serde_json::json!({
                "choices": [],
                "usage": {"prompt_tokens": 12, "completion_tokens": 34, "total_tokens": 46}
            })),
            &mut out,
        );
        assert_eq!(out, vec![UpstreamItem::Usage(UpstreamUsage::new(12, 34))]);
    }

    #[test]
    fn reasoning_content_is_wrapped_once_per_run() {
        let mut decoder = OpenAiStreamDecoder::new(ReasoningMarkers::think());
        let mut out = Vec::new();
        for delta in [
            serde_json::json!({"reasoning_content": "Step "}),
            serde_json::json!({"reasoning_content": "1"}),
            serde_json::json!({"content": "Hello"}),
            serde_json::json!({"content": " world"}),
        ] {
            decoder.decode_into(
                chunk(serde_json::json!({"choices": [{"index": 0, "delta": delta}]})),
                &mut out,
            );
        }
        decoder.finish_into(&mut out);
        assert_eq!(
            fragments(&out),
            vec!["<think>Step ", "1", "</think>Hello", " world"]
        );
    }

    #[test]
    fn open_reasoning_run_is_closed_at_finish() {
        let mut decoder = OpenAiStreamDecoder::new(ReasoningMarkers::think());
        let mut out = Vec::new();
        decoder.decode_into(
            chunk(serde_json::json!({"choices": [{"index": 0, "delta": {"reasoning_content": "hmm"}}]})),
            &mut out,
        );
        decoder.finish_into(&mut out);
        decoder.finish_into(&mut out);
        assert_eq!(fragments(&out), vec!["<think>hmm", "</think>"]);
    }

    #[test]
    fn other_choices_are_ignored() {
        let mut decoder = OpenAiStreamDecoder::new(ReasoningMarkers::think());
        let mut out = Vec::new();
        decoder.decode_into(
            chunk(serde_json::json!({"choices": [{"index": 1, "delta": {"content": "alt"}}]})),
            &mut out,
        );
        assert!(out.is_empty());
    }
}
