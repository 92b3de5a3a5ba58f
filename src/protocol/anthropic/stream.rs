use super::{EventKind, StreamEvent, STOP_REASON_END_TURN};
use crate::util::{push_json_string_escaped, push_u64_decimal, push_usize_decimal};

// Frame encoders write a complete `event: <name>\ndata: <json>\n\n` frame into
// a caller-owned buffer. JSON is assembled by hand so the hot delta path does
// not go through a serde `Value`.

/// Parse a named SSE event emitted by this translator back into a typed event.
#[must_use]
pub fn parse_stream_event(event_name: &str, data: &str) -> Option<StreamEvent> {
    let kind = EventKind::from_name(event_name)?;
    let event: StreamEvent = serde_json::from_str(data).ok()?;
    (event.kind() == kind).then_some(event)
}

#[inline]
fn push_event_line(out: &mut String, kind: EventKind) {
    out.push_str("event: ");
    out.push_str(kind.as_str());
    out.push_str("\ndata: ");
}

/// `message_start` with an empty content list and zero usage.
pub fn encode_message_start_frame(out: &mut String, id: &str, model: &str) {
    out.clear();
    out.reserve(200 + id.len() + model.len());
    push_event_line(out, EventKind::MessageStart);
    out.push_str("{\"type\":\"message_start\",\"message\":{\"id\":");
    push_json_string_escaped(out, id);
    out.push_str(",\"type\":\"message\",\"role\":\"assistant\",\"content\":[],\"model\":");
    push_json_string_escaped(out, model);
    out.push_str(
        ",\"stop_reason\":null,\"stop_sequence\":null,\"usage\":{\"input_tokens\":0,\"output_tokens\":0}}}\n\n",
    );
}

/// `content_block_start` opening an empty text block.
pub fn encode_block_start_frame(out: &mut String, index: usize) {
    out.clear();
    push_event_line(out, EventKind::ContentBlockStart);
    out.push_str("{\"type\":\"content_block_start\",\"index\":");
    push_usize_decimal(out, index);
    out.push_str(",\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n");
}

/// `content_block_delta` carrying one `text_delta`.
pub fn encode_text_delta_frame(out: &mut String, index: usize, text: &str) {
    out.clear();
    out.reserve(112 + text.len());
    push_event_line(out, EventKind::ContentBlockDelta);
    out.push_str("{\"type\":\"content_block_delta\",\"index\":");
    push_usize_decimal(out, index);
    out.push_str(",\"delta\":{\"type\":\"text_delta\",\"text\":");
    push_json_string_escaped(out, text);
    out.push_str("}}\n\n");
}

pub fn encode_block_stop_frame(out: &mut String, index: usize) {
    out.clear();
    push_event_line(out, EventKind::ContentBlockStop);
    out.push_str("{\"type\":\"content_block_stop\",\"index\":");
    push_usize_decimal(out, index);
    out.push_str("}\n\n");
}

/// Terminal `message_delta`: `end_turn` plus the final output token count.
pub fn encode_message_delta_frame(out: &mut String, output_tokens: u64) {
    out.clear();
    push_event_line(out, EventKind::MessageDelta);
    out.push_str("{\"type\":\"message_delta\",\"delta\":{\"stop_reason\":");
    push_json_string_escaped(out, STOP_REASON_END_TURN);
    out.push_str(",\"stop_sequence\":null},\"usage\":{\"output_tokens\":");
    push_u64_decimal(out, output_tokens);
    out.push_str("}}\n\n");
}

pub fn encode_message_stop_frame(out: &mut String) {
    out.clear();
    push_event_line(out, EventKind::MessageStop);
    out.push_str("{\"type\":\"message_stop\"}\n\n");
}
