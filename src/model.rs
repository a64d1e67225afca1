//! Value types shared by the session, its controllers and its views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ClientError, Result};

/// Text shown in place of an answer when the ask call fails
pub const ANSWER_ERROR_MESSAGE: &str = "Sorry, there was an error fetching the answer.";

/// A video the backend has ingested and can answer questions about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    /// Unique title, the only handle the backend knows the video by
    pub title: String,

    /// Where the player loads the media from
    pub source_url: String,
}

impl Video {
    pub fn new(title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_url: source_url.into(),
        }
    }
}

/// A time-bounded transcript excerpt returned as evidence for an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start offset in seconds
    pub start: f64,
    /// End offset in seconds
    pub end: f64,
    pub text: String,
    #[serde(default = "unknown_speaker")]
    pub speaker: String,
}

fn unknown_speaker() -> String {
    "Unknown".to_string()
}

impl Segment {
    /// Check the time bounds of a segment received from the backend
    pub fn validate(&self) -> Result<()> {
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(ClientError::InvalidResponse(format!(
                "segment bounds are not finite: {} - {}",
                self.start, self.end
            )));
        }
        if self.start < 0.0 {
            return Err(ClientError::InvalidResponse(format!(
                "segment starts before zero: {}",
                self.start
            )));
        }
        if self.end < self.start {
            return Err(ClientError::InvalidResponse(format!(
                "segment ends before it starts: {} - {}",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

/// Format a segment's bounds the way the chat log displays them
pub fn format_time_range(start: f64, end: f64) -> String {
    format!("{:.2}s - {:.2}s", start, end)
}

/// Display record for a segment attached to an assistant turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentView {
    /// Formatted range, e.g. `1.00s - 3.50s`
    pub time: String,
    /// Raw start offset used for seeking
    pub start_time: f64,
    pub text: String,
    pub speaker: String,
}

impl From<&Segment> for SegmentView {
    fn from(segment: &Segment) -> Self {
        Self {
            time: format_time_range(segment.start, segment.end),
            start_time: segment.start,
            text: segment.text.clone(),
            speaker: segment.speaker.clone(),
        }
    }
}

/// Language details reported alongside an answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerMeta {
    pub question_language: String,
    pub video_language: String,
    /// The answer in the video's language, before translation
    pub answer_original: String,
}

/// One turn of the chat log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatMessage {
    User {
        content: String,
    },
    Assistant {
        content: String,
        meta: Option<AnswerMeta>,
        segments: Vec<SegmentView>,
    },
    /// Assistant-role fallback when the ask call fails
    Error {
        content: String,
    },
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage::User {
            content: content.into(),
        }
    }

    pub fn answer_error() -> Self {
        ChatMessage::Error {
            content: ANSWER_ERROR_MESSAGE.to_string(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            ChatMessage::User { content }
            | ChatMessage::Assistant { content, .. }
            | ChatMessage::Error { content } => content,
        }
    }

    pub fn segments(&self) -> &[SegmentView] {
        match self {
            ChatMessage::Assistant { segments, .. } => segments,
            _ => &[],
        }
    }
}

/// Identifies one ask cycle; ids increase monotonically within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A chat message as stored in the session log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Ask cycle this entry belongs to
    pub request: RequestId,
    pub message: ChatMessage,
    pub recorded_at: DateTime<Utc>,
    /// Set when a newer answer for the same video was applied first
    pub superseded: bool,
}
