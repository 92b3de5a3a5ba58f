use bytes::Bytes;
use futures_util::StreamExt;
use thinkbridge::config::parse_config;
use thinkbridge::error::TranscodeError;
use thinkbridge::protocol::anthropic::stream::parse_stream_event;
use thinkbridge::protocol::anthropic::{StreamEvent, TextDelta};
use thinkbridge::reasoning::ReasoningMarkers;
use thinkbridge::stream::{sse_frame_stream, transcode_sse_stream, PipelineOptions, SseParser};

fn options() -> PipelineOptions {
    PipelineOptions {
        markers: ReasoningMarkers::think(),
        default_model: "fallback-model".to_string(),
        echo_upstream_model: true,
        message_id: "msg_pipe".to_string(),
        finish_on_abort: true,
    }
}

fn content_chunk(content: &str) -> String {
    let chunk = serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion.chunk",
        "model": "deepseek-r1",
        "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]
    });
    format!("data: {chunk}\n\n")
}

fn upstream_body(fragments: &[&str], usage: Option<(u64, u64)>) -> String {
    let mut body = String::new();
    for fragment in fragments {
        body.push_str(&content_chunk(fragment));
    }
    if let Some((prompt, completion)) = usage {
        let chunk = serde_json::json!({
            "choices": [],
            "usage": {"prompt_tokens": prompt, "completion_tokens": completion, "total_tokens": prompt + completion}
        });
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn chunked(body: &str, size: usize) -> Vec<Result<Bytes, std::io::Error>> {
    body.as_bytes()
        .chunks(size)
        .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
        .collect()
}

async fn run_pipeline(
    chunks: Vec<Result<Bytes, std::io::Error>>,
    opts: PipelineOptions,
) -> (String, Option<TranscodeError>) {
    let stream = transcode_sse_stream(futures_util::stream::iter(chunks), opts);
    futures_util::pin_mut!(stream);
    let mut out = String::new();
    let mut error = None;
    while let Some(item) = stream.next().await {
        match item {
            Ok(frame) => out.push_str(std::str::from_utf8(&frame).expect("utf8 frame")),
            Err(err) => {
                assert!(error.is_none(), "at most one error");
                error = Some(err);
            }
        }
    }
    (out, error)
}

fn parse_output(out: &str) -> Vec<StreamEvent> {
    let mut parser = SseParser::new();
    parser
        .feed(out)
        .into_iter()
        .map(|event| {
            parse_stream_event(event.event.as_deref().expect("named event"), &event.data)
                .expect("known event")
        })
        .collect()
}

fn deltas(events: &[StreamEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::ContentBlockDelta {
                delta: TextDelta::Text { text },
                ..
            } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_end_to_end_from_upstream_sse() {
    let body = upstream_body(&["<think>Step ", "1</think>", "Hello", " world"], Some((12, 34)));
    let (out, error) = run_pipeline(chunked(&body, body.len()), options()).await;
    assert!(error.is_none());

    let events = parse_output(&out);
    assert_eq!(deltas(&events), vec!["Step 1", "Hello", " world"]);
    match &events[0] {
        StreamEvent::MessageStart { message } => {
            assert_eq!(message.id, "msg_pipe");
            assert_eq!(message.model, "deepseek-r1");
        }
        other => panic!("expected message_start, got {other:?}"),
    }
    match &events[events.len() - 2] {
        StreamEvent::MessageDelta { usage, .. } => assert_eq!(usage.output_tokens, 34),
        other => panic!("expected message_delta, got {other:?}"),
    }
    assert!(matches!(events.last(), Some(StreamEvent::MessageStop {})));
}

#[tokio::test]
async fn test_output_independent_of_transport_chunking() {
    let body = upstream_body(
        &["Voilà <th", "ink>\nrésumé", " d'abord\n</think>", "\n\nRéponse: ", "oui"],
        Some((3, 5)),
    );
    let (expected, error) = run_pipeline(chunked(&body, body.len()), options()).await;
    assert!(error.is_none());
    assert_eq!(
        deltas(&parse_output(&expected)),
        vec!["Voilà ", "résumé d'abord", "\nRéponse: ", "oui"]
    );

    for size in [1, 2, 3, 7, 16, 64] {
        let (out, error) = run_pipeline(chunked(&body, size), options()).await;
        assert!(error.is_none(), "chunk size {size}");
        assert_eq!(out, expected, "chunk size {size}");
    }
}

#[tokio::test]
async fn test_reasoning_content_field_is_bridged() {
    let mut body = String::new();
    for delta in [
        serde_json::json!({"role": "assistant", "reasoning_content": "Step "}),
        serde_json::json!({"reasoning_content": "1"}),
        serde_json::json!({"content": "Hello"}),
    ] {
        let chunk = serde_json::json!({"model": "deepseek-reasoner", "choices": [{"index": 0, "delta": delta}]});
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");

    let (out, error) = run_pipeline(chunked(&body, 5), options()).await;
    assert!(error.is_none());
    assert_eq!(deltas(&parse_output(&out)), vec!["Step 1", "Hello"]);
}

#[tokio::test]
async fn test_missing_done_still_finishes() {
    let body = content_chunk("tail<thi");
    let (out, error) = run_pipeline(chunked(&body, 4), options()).await;
    assert!(error.is_none());
    let events = parse_output(&out);
    assert_eq!(deltas(&events), vec!["tail", "<thi"]);
    assert!(matches!(events.last(), Some(StreamEvent::MessageStop {})));
}

#[tokio::test]
async fn test_garbage_events_are_skipped() {
    let mut body = String::from(": keep-alive\n\ndata: {broken\n\n");
    body.push_str(&upstream_body(&["ok"], None));
    let (out, error) = run_pipeline(chunked(&body, 9), options()).await;
    assert!(error.is_none());
    assert_eq!(deltas(&parse_output(&out)), vec!["ok"]);
}

#[tokio::test]
async fn test_transport_error_finishes_then_fails() {
    let mut chunks = chunked(&content_chunk("<think>half"), 1024);
    chunks.push(Err(std::io::Error::new(
        std::io::ErrorKind::ConnectionReset,
        "upstream reset",
    )));
    let (out, error) = run_pipeline(chunks, options()).await;

    let events = parse_output(&out);
    assert_eq!(deltas(&events), vec!["half"]);
    assert!(matches!(events.last(), Some(StreamEvent::MessageStop {})));
    match error {
        Some(TranscodeError::Upstream(message)) => assert!(message.contains("upstream reset")),
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_options_from_config() {
    let config = parse_config(
        "markers:\n  start: \"<r>\"\n  end: \"</r>\"\noutput:\n  echo_upstream_model: false\n  default_model: \"bridge\"\n",
    )
    .expect("config");
    let opts = PipelineOptions {
        markers: config.markers(),
        default_model: config.output.default_model.clone(),
        echo_upstream_model: config.output.echo_upstream_model,
        message_id: "msg_cfg".to_string(),
        finish_on_abort: config.stream.finish_on_abort,
    };
    let body = upstream_body(&["<r>why</r>so"], None);
    let (out, _) = run_pipeline(chunked(&body, 11), opts).await;
    let events = parse_output(&out);
    assert_eq!(deltas(&events), vec!["why", "so"]);
    match &events[0] {
        StreamEvent::MessageStart { message } => assert_eq!(message.model, "bridge"),
        other => panic!("expected message_start, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sse_frame_stream_yields_upstream_events() {
    let body = upstream_body(&["a"], None);
    let events: Vec<_> = sse_frame_stream(futures_util::stream::iter(chunked(&body, 3)))
        .collect()
        .await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].as_ref().expect("event").data, "[DONE]");
}
