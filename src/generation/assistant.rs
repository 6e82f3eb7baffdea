use super::backend::{GenerationBackend, GenerationError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Maximum number of smart replies forwarded to the client
const MAX_REPLIES: usize = 3;

/// Outcome of one generation request, already checked against the
/// expected shape
#[derive(Debug, Clone, PartialEq)]
pub enum Generated<T> {
    Ready(T),
    QuotaExceeded,
    /// Backend failed or returned an unexpected shape
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    #[serde(default)]
    pub detected_language: Option<String>,
    pub translation: String,
}

impl Translation {
    /// Shown when the backend output could not be used
    pub fn fallback(original: &str) -> Self {
        Self {
            detected_language: None,
            translation: format!("[Error] {}", original),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RepliesPayload {
    replies: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryPayload {
    summary: String,
}

pub const SUMMARY_FALLBACK: &str = "Summary unavailable.";

/// Translation, smart replies and summaries on top of a generation backend
pub struct Assistant {
    backend: Arc<dyn GenerationBackend>,
}

impl Assistant {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub async fn translate(&self, text: &str) -> Generated<Translation> {
        let prompt = format!(
            "Analyze the following text and:\n\
             1. Detect if it's in Spanish or English\n\
             2. If Spanish, translate to English\n\
             3. If English, translate to Spanish\n\
             \n\
             Input Text: {}\n\
             \n\
             Output Format (JSON):\n\
             {{\"detected_language\": \"es\" or \"en\", \"translation\": \"Translated text here\"}}",
            quote_input(text)
        );
        self.request("translation", &prompt).await
    }

    pub async fn smart_replies(&self, text: &str) -> Generated<Vec<String>> {
        let prompt = format!(
            "Provide {} short, professional smart replies to the following text, \
             in the SAME language as the text.\n\
             \n\
             Input Text: {}\n\
             \n\
             Output Format (JSON):\n\
             {{\"replies\": [\"Reply 1\", \"Reply 2\", \"Reply 3\"]}}",
            MAX_REPLIES,
            quote_input(text)
        );

        match self.request::<RepliesPayload>("replies", &prompt).await {
            Generated::Ready(payload) => {
                let replies: Vec<String> = payload
                    .replies
                    .into_iter()
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty())
                    .take(MAX_REPLIES)
                    .collect();
                Generated::Ready(replies)
            }
            Generated::QuotaExceeded => Generated::QuotaExceeded,
            Generated::Malformed(reason) => Generated::Malformed(reason),
        }
    }

    pub async fn summarize(&self, transcript: &str) -> Generated<String> {
        let prompt = format!(
            "Summarize the following conversation transcript as a short list of \
             key points, one per line, each starting with \"- \".\n\
             \n\
             Transcript: {}\n\
             \n\
             Output Format (JSON):\n\
             {{\"summary\": \"- point one\\n- point two\"}}",
            quote_input(transcript)
        );

        match self.request::<SummaryPayload>("summary", &prompt).await {
            Generated::Ready(payload) if payload.summary.trim().is_empty() => {
                Generated::Malformed("empty summary".to_string())
            }
            Generated::Ready(payload) => Generated::Ready(payload.summary),
            Generated::QuotaExceeded => Generated::QuotaExceeded,
            Generated::Malformed(reason) => Generated::Malformed(reason),
        }
    }

    async fn request<T: DeserializeOwned>(&self, task: &str, prompt: &str) -> Generated<T> {
        match self.backend.generate_json(prompt).await {
            Ok(value) => match serde_json::from_value::<T>(value) {
                Ok(payload) => Generated::Ready(payload),
                Err(e) => {
                    warn!(task, backend = %self.backend.name(), "Unexpected generation output: {}", e);
                    Generated::Malformed(e.to_string())
                }
            },
            Err(GenerationError::QuotaExceeded) => {
                warn!(task, backend = %self.backend.name(), "Generation quota exceeded");
                Generated::QuotaExceeded
            }
            Err(e) => {
                warn!(task, backend = %self.backend.name(), "Generation failed: {}", e);
                Generated::Malformed(e.to_string())
            }
        }
    }
}

const INPUT_DELIMITER: &str = "\"\"\"";

fn quote_input(text: &str) -> String {
    // Keep the delimiter unambiguous inside the prompt
    let cleaned = text.replace(INPUT_DELIMITER, "\"");
    format!("{}{}{}", INPUT_DELIMITER, cleaned, INPUT_DELIMITER)
}

/// Text between the first pair of input delimiters in a prompt
pub fn prompt_input(prompt: &str) -> Option<&str> {
    let start = prompt.find(INPUT_DELIMITER)? + INPUT_DELIMITER.len();
    let len = prompt[start..].find(INPUT_DELIMITER)?;
    Some(&prompt[start..start + len])
}
