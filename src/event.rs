//! Score events and the parser that extracts them from stream messages.

use crate::error::ParseError;
use serde::{Deserialize, Serialize};

/// Event type tag carried by score postings.
pub const SCORE_EVENT: &str = "score";

/// SSE event type assumed when a message carries no `event:` field.
pub const DEFAULT_EVENT: &str = "message";

/// One raw message from the upstream stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub event: String,
    pub data: String,
}

impl StreamMessage {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }

    /// The event type, with an absent tag read as [`DEFAULT_EVENT`].
    pub fn kind(&self) -> &str {
        if self.event.is_empty() {
            DEFAULT_EVENT
        } else {
            &self.event
        }
    }
}

impl From<eventsource_stream::Event> for StreamMessage {
    fn from(event: eventsource_stream::Event) -> Self {
        Self {
            event: event.event,
            data: event.data,
        }
    }
}

/// A student received a score on an exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEvent {
    #[serde(rename = "studentId")]
    pub student_id: String,
    #[serde(rename = "exam")]
    pub exam_id: String,
    /// Decimal as sent upstream, kept verbatim.
    pub score: String,
}

impl ScoreEvent {
    pub fn new(
        student_id: impl Into<String>,
        exam_id: impl Into<String>,
        score: impl Into<String>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            exam_id: exam_id.into(),
            score: score.into(),
        }
    }
}

/// Decodes one stream message.
///
/// Returns `Ok(None)` for messages that are not score postings; the caller
/// skips those. Score postings with a missing, empty or non-string field, or
/// a score that does not read as a finite decimal, are a [`ParseError`].
pub fn parse(message: &StreamMessage) -> Result<Option<ScoreEvent>, ParseError> {
    if message.kind() != SCORE_EVENT {
        return Ok(None);
    }

    let event: ScoreEvent = serde_json::from_str(&message.data)?;

    if event.student_id.is_empty() {
        return Err(ParseError::EmptyField("studentId"));
    }
    if event.exam_id.is_empty() {
        return Err(ParseError::EmptyField("exam"));
    }
    match event.score.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => {}
        _ => return Err(ParseError::Score(event.score)),
    }

    Ok(Some(event))
}
