use crate::cache::CacheConfig;
use crate::enrichment::EnrichmentConfig;
use crate::generation::{GeminiClient, GeminiConfig, GenerationBackend, MockGenerator};
use crate::session::{ContextConfig, SessionConfig};
use crate::speech::{BridgeConfig, RecognitionConfig, RecognitionProvider};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub usage: UsageConfig,
    pub cache: CacheSettings,
    pub recognition: RecognitionSettings,
    pub generation: GenerationSettings,
    pub enrichment: EnrichmentSettings,
    pub context: ContextSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "langbridge".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    /// Free-tier allowance per session id, in seconds of active audio
    pub limit_seconds: f64,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self { limit_seconds: 900.0 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_size: usize,
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_size: 1000,
            ttl_secs: 86400,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// Only "mock" ships with the service
    pub provider: String,
    pub sample_rate: u32,
    pub language_code: String,
    pub diarization: bool,
    pub min_speakers: u32,
    pub max_speakers: u32,
    pub interim_results: bool,
    pub reconnect_backoff_ms: u64,
    /// Mock recognizer: emit a final result every N chunks
    pub mock_final_every: usize,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            sample_rate: 16000,
            language_code: "es-ES".to_string(),
            diarization: true,
            min_speakers: 2,
            max_speakers: 6,
            interim_results: true,
            reconnect_backoff_ms: 1000,
            mock_final_every: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// "gemini" or "mock"; gemini falls back to mock without an API key
    pub provider: String,
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub source_language: String,
    pub target_language: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            api_key: None,
            model: "gemini-pro".to_string(),
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            timeout_secs: 30,
            source_language: "auto".to_string(),
            target_language: "auto".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichmentSettings {
    pub min_words: usize,
    pub summary_max_chars: usize,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            min_words: 3,
            summary_max_chars: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    pub timeout_secs: u64,
    pub min_words: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            min_words: 2,
        }
    }
}

impl Config {
    /// Load configuration from an optional file (any format the `config`
    /// crate understands) overlaid with `LANGBRIDGE__SECTION__KEY`
    /// environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("LANGBRIDGE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path))?;

        let mut cfg: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;

        if cfg.generation.api_key.is_none() {
            cfg.generation.api_key = std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty());
        }

        Ok(cfg)
    }

    /// Per-connection session settings; the session id is filled in by the
    /// caller
    pub fn session_config(&self, session_id: impl Into<String>) -> SessionConfig {
        SessionConfig {
            session_id: session_id.into(),
            usage_limit_secs: self.usage.limit_seconds,
            bridge: self.bridge_config(),
            enrichment: EnrichmentConfig {
                min_words: self.enrichment.min_words,
            },
            context: ContextConfig {
                timeout: Duration::from_secs(self.context.timeout_secs),
                min_words: self.context.min_words,
            },
            summary_max_chars: self.enrichment.summary_max_chars,
        }
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        let r = &self.recognition;
        BridgeConfig {
            recognition: RecognitionConfig {
                sample_rate_hertz: r.sample_rate,
                language_code: r.language_code.clone(),
                interim_results: r.interim_results,
                enable_automatic_punctuation: true,
                enable_speaker_diarization: r.diarization,
                min_speaker_count: r.min_speakers,
                max_speaker_count: r.max_speakers,
            },
            reconnect_backoff: Duration::from_millis(r.reconnect_backoff_ms),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_size: self.cache.max_size,
            ttl: Duration::from_secs(self.cache.ttl_secs),
            source_language: self.generation.source_language.clone(),
            target_language: self.generation.target_language.clone(),
        }
    }

    pub fn recognition_provider(&self) -> Result<RecognitionProvider> {
        match self.recognition.provider.as_str() {
            "mock" => Ok(RecognitionProvider::Mock {
                final_every: self.recognition.mock_final_every,
            }),
            other => anyhow::bail!("Unsupported recognition provider: {}", other),
        }
    }

    /// Build the generation backend, falling back to the offline mock when
    /// Gemini has no API key
    pub fn generation_backend(&self) -> Result<Arc<dyn GenerationBackend>> {
        let g = &self.generation;
        match g.provider.as_str() {
            "mock" => Ok(Arc::new(MockGenerator::new())),
            "gemini" => match g.api_key.as_deref() {
                Some(key) => {
                    info!("Using Gemini model {}", g.model);
                    let client = GeminiClient::new(GeminiConfig {
                        endpoint: g.endpoint.clone(),
                        api_key: key.to_string(),
                        model: g.model.clone(),
                        timeout: Duration::from_secs(g.timeout_secs),
                    })?;
                    Ok(Arc::new(client))
                }
                None => {
                    warn!("No Gemini API key configured, using mock generator");
                    Ok(Arc::new(MockGenerator::new()))
                }
            },
            other => anyhow::bail!("Unsupported generation provider: {}", other),
        }
    }
}
