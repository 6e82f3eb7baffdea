use super::messages::{RecognitionConfig, RecognitionResponse};
use super::mock::MockRecognizer;
use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;

/// Audio chunks pulled by the backend while a streaming call is open
pub type AudioRequests = Box<dyn Iterator<Item = Vec<u8>> + Send>;

/// Blocking response stream of a streaming call
pub type ResponseStream =
    Box<dyn Iterator<Item = Result<RecognitionResponse, RecognitionError>> + Send>;

#[derive(Debug, Error)]
pub enum RecognitionError {
    /// Stream dropped or backend unavailable; the call is reopened
    #[error("recognition stream interrupted: {0}")]
    Transient(String),

    /// Unrecoverable (bad credentials, invalid config); the bridge closes
    #[error("recognition backend failed: {0}")]
    Fatal(String),
}

impl RecognitionError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, RecognitionError::Fatal(_))
    }
}

/// Speech recognition backend trait
///
/// The call is blocking on both sides: the backend pulls audio from
/// `requests` and the caller pulls responses from the returned stream.
/// Implementations must never be driven from an async task.
pub trait RecognitionBackend: Send + Sync {
    fn streaming_recognize(
        &self,
        config: &RecognitionConfig,
        requests: AudioRequests,
    ) -> Result<ResponseStream, RecognitionError>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Recognition provider selected in configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionProvider {
    /// Simulated transcripts (no credentials required)
    Mock { final_every: usize },
}

/// Recognition backend factory
pub struct RecognitionBackendFactory;

impl RecognitionBackendFactory {
    pub fn create(provider: RecognitionProvider) -> Result<Arc<dyn RecognitionBackend>> {
        match provider {
            RecognitionProvider::Mock { final_every } => {
                if final_every == 0 {
                    anyhow::bail!("mock recognizer needs final_every > 0");
                }
                Ok(Arc::new(MockRecognizer::new(final_every)))
            }
        }
    }
}
