use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    /// Rate limit or quota exhausted; never cached, shown to the user
    #[error("generation quota exceeded")]
    QuotaExceeded,

    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generation backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("generation backend returned no content")]
    EmptyResponse,

    #[error("generation output is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Language-generation backend trait
///
/// Takes a text prompt and returns the model's output parsed as JSON.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate_json(&self, prompt: &str) -> Result<serde_json::Value, GenerationError>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Strip a Markdown code fence the model may wrap its JSON in
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
