pub mod cache;
pub mod config;
pub mod enrichment;
pub mod generation;
pub mod http;
pub mod protocol;
pub mod session;
pub mod speech;
pub mod usage;

pub use cache::{CacheConfig, CacheStats, TranslationCache};
pub use config::Config;
pub use enrichment::{EnrichmentConfig, EnrichmentPipeline};
pub use generation::{Assistant, GenerationBackend, GenerationError, Generated, Translation};
pub use http::{create_router, AppState};
pub use protocol::{ClientCommand, GenerationScope, OutboundEvent, SessionEvent};
pub use session::{
    CloseReason, InboundMessage, LiveSession, SessionConfig, SessionServices, SessionStats,
};
pub use speech::{
    AudioFrame, BridgeConfig, RecognitionBackend, RecognitionError, StreamingBridge,
    TranscriptEvent,
};
pub use usage::UsageLedger;
