pub mod response_encoder;
pub mod stream;

use serde::{Deserialize, Serialize};

/// The only stop reason this translator reports.
pub const STOP_REASON_END_TURN: &str = "end_turn";

/// Named SSE events of the Messages streaming protocol, in lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MessageStart,
    ContentBlockStart,
    ContentBlockDelta,
    ContentBlockStop,
    MessageDelta,
    MessageStop,
}

impl EventKind {
    /// Wire name used on the `event:` line and in the payload `type`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::MessageStart => "message_start",
            EventKind::ContentBlockStart => "content_block_start",
            EventKind::ContentBlockDelta => "content_block_delta",
            EventKind::ContentBlockStop => "content_block_stop",
            EventKind::MessageDelta => "message_delta",
            EventKind::MessageStop => "message_stop",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "message_start" => Some(EventKind::MessageStart),
            "content_block_start" => Some(EventKind::ContentBlockStart),
            "content_block_delta" => Some(EventKind::ContentBlockDelta),
            "content_block_stop" => Some(EventKind::ContentBlockStop),
            "message_delta" => Some(EventKind::MessageDelta),
            "message_stop" => Some(EventKind::MessageStop),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complete (non-streaming) message response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub role: String,
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<MessageUsage>,
}

/// A content block. Reasoning and visible text both travel as `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
}

impl ContentBlock {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            ContentBlock::Text { text } => text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A decoded streaming event, as a client of this translator sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "message_start")]
    MessageStart { message: MessageStartBody },
    #[serde(rename = "content_block_start")]
    ContentBlockStart {
        index: usize,
        content_block: ContentBlock,
    },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { index: usize, delta: TextDelta },
    #[serde(rename = "content_block_stop")]
    ContentBlockStop { index: usize },
    #[serde(rename = "message_delta")]
    MessageDelta {
        delta: MessageDeltaBody,
        usage: OutputUsage,
    },
    #[serde(rename = "message_stop")]
    MessageStop {},
}

impl StreamEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            StreamEvent::MessageStart { .. } => EventKind::MessageStart,
            StreamEvent::ContentBlockStart { .. } => EventKind::ContentBlockStart,
            StreamEvent::ContentBlockDelta { .. } => EventKind::ContentBlockDelta,
            StreamEvent::ContentBlockStop { .. } => EventKind::ContentBlockStop,
            StreamEvent::MessageDelta { .. } => EventKind::MessageDelta,
            StreamEvent::MessageStop {} => EventKind::MessageStop,
        }
    }
}

/// `message` envelope of `message_start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStartBody {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub role: String,
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
    pub usage: MessageUsage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TextDelta {
    #[serde(rename = "text_delta")]
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDeltaBody {
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputUsage {
    pub output_tokens: u64,
}
