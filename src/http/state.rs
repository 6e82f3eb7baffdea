use crate::cache::TranslationCache;
use crate::config::Config;
use crate::generation::Assistant;
use crate::session::SessionServices;
use crate::speech::RecognitionBackendFactory;
use crate::usage::UsageLedger;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registry entry for a connected session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
}

/// Shared application state for HTTP and WebSocket handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Backends, cache and usage ledger shared by every session
    pub services: SessionServices,

    /// Connected sessions (session_id → info)
    pub sessions: Arc<RwLock<HashMap<String, SessionInfo>>>,
}

impl AppState {
    pub fn new(config: Config, services: SessionServices) -> Self {
        Self {
            config: Arc::new(config),
            services,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Build the process-wide services described by `config`
    pub fn from_config(config: Config) -> Result<Self> {
        let recognizer = RecognitionBackendFactory::create(config.recognition_provider()?)?;
        let assistant = Arc::new(Assistant::new(config.generation_backend()?));
        let cache = Arc::new(TranslationCache::new(config.cache_config()));

        let services = SessionServices {
            recognizer,
            assistant,
            cache,
            usage: Arc::new(UsageLedger::new()),
        };

        Ok(Self::new(config, services))
    }
}
