use super::assistant::prompt_input;
use super::backend::{GenerationBackend, GenerationError};
use async_trait::async_trait;
use serde_json::json;

/// Offline generator used when no API key is configured.
///
/// Echoes the prompt's input text back in every field the assistant asks
/// for, so the full enrichment flow works without a real model.
#[derive(Debug, Default)]
pub struct MockGenerator;

impl MockGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GenerationBackend for MockGenerator {
    async fn generate_json(&self, prompt: &str) -> Result<serde_json::Value, GenerationError> {
        let input = prompt_input(prompt).unwrap_or(prompt).trim();

        Ok(json!({
            "detected_language": "auto",
            "translation": format!("[Mock] {}", input),
            "replies": ["Ok", "Tell me more", "Next"],
            "summary": format!("- {}", input),
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
