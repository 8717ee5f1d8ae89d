// Outbound events
// Everything written to the client is one of these, framed as
// [1-byte tag][u32 little-endian payload length][msgpack payload]

use std::fmt::Display;

use serde::Serialize;

use super::tool_call::ToolCall;
use crate::utils::clean::clean_text;

/// Frame header size: tag byte plus payload length
pub const FRAME_HEADER_LEN: usize = 5;

/// Wire tag of each event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    Start = 0,
    Id = 1,
    Reasoning = 2,
    ReasoningKind = 3,
    Text = 4,
    Image = 5,
    Tool = 6,
    Error = 7,
    End = 8,
    Alive = 9,
}

impl EventKind {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => EventKind::Start,
            1 => EventKind::Id,
            2 => EventKind::Reasoning,
            3 => EventKind::ReasoningKind,
            4 => EventKind::Text,
            5 => EventKind::Image,
            6 => EventKind::Tool,
            7 => EventKind::Error,
            8 => EventKind::End,
            9 => EventKind::Alive,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::Id => "id",
            EventKind::Reasoning => "reasoning",
            EventKind::ReasoningKind => "reasoning_kind",
            EventKind::Text => "text",
            EventKind::Image => "image",
            EventKind::Tool => "tool",
            EventKind::Error => "error",
            EventKind::End => "end",
            EventKind::Alive => "alive",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A round trip is starting
    Start,
    /// Provider generation id
    Id(String),
    Reasoning(String),
    /// Type tag of the first structured reasoning detail
    ReasoningKind(String),
    Text(String),
    /// Generated image URL (usually a data URL)
    Image(String),
    Tool(ToolCall),
    Error(String),
    /// A round trip has finished
    End,
    Alive,
}

impl Event {
    pub fn error(err: impl Display) -> Self {
        Event::Error(err.to_string())
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::Start => EventKind::Start,
            Event::Id(_) => EventKind::Id,
            Event::Reasoning(_) => EventKind::Reasoning,
            Event::ReasoningKind(_) => EventKind::ReasoningKind,
            Event::Text(_) => EventKind::Text,
            Event::Image(_) => EventKind::Image,
            Event::Tool(_) => EventKind::Tool,
            Event::Error(_) => EventKind::Error,
            Event::End => EventKind::End,
            Event::Alive => EventKind::Alive,
        }
    }

    /// Normalize typographic punctuation in plain string payloads
    pub fn cleaned(self) -> Self {
        match self {
            Event::Id(text) => Event::Id(clean_text(&text)),
            Event::Reasoning(text) => Event::Reasoning(clean_text(&text)),
            Event::ReasoningKind(text) => Event::ReasoningKind(clean_text(&text)),
            Event::Text(text) => Event::Text(clean_text(&text)),
            Event::Image(text) => Event::Image(clean_text(&text)),
            other => other,
        }
    }

    fn payload(&self) -> Result<Option<Vec<u8>>, rmp_serde::encode::Error> {
        fn string<T: Serialize>(value: &T) -> Result<Option<Vec<u8>>, rmp_serde::encode::Error> {
            rmp_serde::to_vec(value).map(Some)
        }

        match self {
            Event::Start | Event::End | Event::Alive => Ok(None),
            Event::Id(text)
            | Event::Reasoning(text)
            | Event::ReasoningKind(text)
            | Event::Text(text)
            | Event::Image(text)
            | Event::Error(text) => string(text),
            Event::Tool(call) => rmp_serde::to_vec_named(call).map(Some),
        }
    }

    /// Encode into one complete frame
    pub fn encode(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        let payload = self.payload()?;
        let payload = payload.as_deref().unwrap_or_default();

        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        frame.push(self.kind().tag());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(payload);

        Ok(frame)
    }
}
