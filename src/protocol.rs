//! JSON messages exchanged with the client over the WebSocket

use crate::speech::TranscriptEvent;
use serde::{Deserialize, Serialize};

/// Text-frame commands sent by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    Ping,
    RequestSummary,
}

impl ClientCommand {
    /// `None` for anything that is not a known command
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Which generation request hit the quota
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationScope {
    Translation,
    Replies,
    Summary,
}

/// Events with a `type` discriminator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Transcript {
        text: String,
        is_final: bool,
        speaker: Option<i32>,
        #[serde(default, skip_serializing_if = "is_false")]
        error: bool,
    },
    TranslationOnly {
        original: String,
        translation: String,
    },
    RepliesOnly {
        replies: Vec<String>,
    },
    Summary {
        summary: String,
    },
    QuotaExceeded {
        scope: GenerationScope,
        original: Option<String>,
        message: String,
    },
}

/// `{"error": "LIMIT_EXCEEDED", "message": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub error: String,
    pub message: String,
}

/// Everything the server pushes to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundEvent {
    Session(SessionEvent),
    Error(ErrorEvent),
}

pub const LIMIT_EXCEEDED: &str = "LIMIT_EXCEEDED";

impl OutboundEvent {
    pub fn transcript(event: &TranscriptEvent) -> Self {
        Self::Session(SessionEvent::Transcript {
            text: event.text.clone(),
            is_final: event.is_final,
            speaker: event.speaker_tag,
            error: event.error,
        })
    }

    pub fn translation(original: impl Into<String>, translation: impl Into<String>) -> Self {
        Self::Session(SessionEvent::TranslationOnly {
            original: original.into(),
            translation: translation.into(),
        })
    }

    pub fn replies(replies: Vec<String>) -> Self {
        Self::Session(SessionEvent::RepliesOnly { replies })
    }

    pub fn summary(summary: impl Into<String>) -> Self {
        Self::Session(SessionEvent::Summary {
            summary: summary.into(),
        })
    }

    pub fn quota_exceeded(scope: GenerationScope, original: Option<String>) -> Self {
        Self::Session(SessionEvent::QuotaExceeded {
            scope,
            original,
            message: "Generation quota exceeded, try again later.".to_string(),
        })
    }

    pub fn limit_exceeded(limit_secs: f64) -> Self {
        Self::Error(ErrorEvent {
            error: LIMIT_EXCEEDED.to_string(),
            message: format!(
                "{}-minute free tier limit reached.",
                (limit_secs / 60.0).round() as u64
            ),
        })
    }

    pub fn to_json(&self) -> String {
        // Plain data enums; serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
