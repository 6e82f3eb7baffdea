use super::context::ContextConfig;
use crate::enrichment::EnrichmentConfig;
use crate::speech::BridgeConfig;

/// Configuration for a live translation session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Session identifier, also the usage ledger key
    pub session_id: String,

    /// Accumulated active seconds after which the session is closed
    /// Default: 900 seconds (15-minute free tier)
    pub usage_limit_secs: f64,

    /// Recognition stream settings
    pub bridge: BridgeConfig,

    pub enrichment: EnrichmentConfig,

    /// Speaker fragment stitching
    pub context: ContextConfig,

    /// Only the most recent characters of the transcript are summarized
    pub summary_max_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            usage_limit_secs: 900.0,
            bridge: BridgeConfig::default(),
            enrichment: EnrichmentConfig::default(),
            context: ContextConfig::default(),
            summary_max_chars: 3000,
        }
    }
}
