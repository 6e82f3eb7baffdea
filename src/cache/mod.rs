//! Content-addressed translation cache shared by all sessions

mod translation;

pub use translation::{fingerprint, CacheConfig, CacheStats, TranslationCache};
