use super::{ContentBlock, MessageResponse, MessageUsage, STOP_REASON_END_TURN};
use crate::protocol::canonical::UpstreamUsage;
use crate::reasoning::{classify_final, PieceKind, ReasoningMarkers, ScanState};

/// Envelope fields of an assembled message.
#[derive(Debug, Clone, Copy)]
pub struct AssembleOptions<'a> {
    pub id: &'a str,
    pub model: &'a str,
    pub markers: &'a ReasoningMarkers,
}

/// Build a complete message from a finished response text.
///
/// The first reasoning segment becomes the first block; everything else,
/// including any later segment with its markers, is the visible block. The
/// text goes through the same classifier as the streaming path, so an
/// unterminated reasoning segment runs to the end of the text and a stray
/// end marker stays literal.
#[must_use]
pub fn assemble_message(
    text: &str,
    opts: AssembleOptions<'_>,
    usage: Option<UpstreamUsage>,
) -> MessageResponse {
    let (reasoning, visible) = split_reasoning(text, opts.markers);

    let mut content = Vec::with_capacity(2);
    if !reasoning.is_empty() {
        content.push(ContentBlock::Text { text: reasoning });
    }
    if !visible.is_empty() {
        content.push(ContentBlock::Text { text: visible });
    }
    if content.is_empty() {
        content.push(ContentBlock::Text {
            text: String::new(),
        });
    }

    MessageResponse {
        id: opts.id.to_owned(),
        type_: "message".to_string(),
        role: "assistant".to_string(),
        content,
        model: opts.model.to_owned(),
        stop_reason: Some(STOP_REASON_END_TURN.to_string()),
        stop_sequence: None,
        usage: usage.map(|u| MessageUsage {
            input_tokens: u.input_tokens(),
            output_tokens: u.output_tokens(),
        }),
    }
}

/// Split a complete text into `(reasoning, visible)`.
#[must_use]
pub fn split_reasoning(text: &str, markers: &ReasoningMarkers) -> (String, String) {
    let classified = classify_final(text, ScanState::default(), markers);
    if classified.stray_end_marker {
        tracing::debug!(
            end_marker = markers.end(),
            "unmatched reasoning end marker kept as text"
        );
    }

    let mut reasoning = String::new();
    let mut visible = String::new();
    for piece in &classified.pieces {
        match piece.kind {
            PieceKind::Reasoning => reasoning.push_str(piece.text),
            PieceKind::Visible => visible.push_str(piece.text),
        }
        if piece.closes_segment {
            visible.push_str(text_after_segment(text, piece.text, markers.end()));
            break;
        }
    }
    (reasoning, visible)
}

/// Raw text after the end marker that follows `closing`, minus the marker's
/// framing newline. `closing` must be a slice of `text`.
fn text_after_segment<'t>(text: &'t str, closing: &str, end_marker: &str) -> &'t str {
    let offset = closing.as_ptr() as usize - text.as_ptr() as usize + closing.len();
    match text[offset..].find(end_marker) {
        Some(pos) => {
            let rest = &text[offset + pos + end_marker.len()..];
            rest.strip_prefix('\n').unwrap_or(rest)
        }
        None => "",
    }
}
