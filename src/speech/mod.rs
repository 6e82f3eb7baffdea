//! Speech recognition: backend contract and the streaming bridge
//!
//! The recognition backend is a blocking, duplex streaming call. The
//! `StreamingBridge` runs it on a dedicated thread per session and exposes
//! its results as an async sequence of `TranscriptEvent`s.

pub mod backend;
pub mod bridge;
pub mod messages;
pub mod mock;

pub use backend::{
    AudioRequests, RecognitionBackend, RecognitionBackendFactory, RecognitionError,
    RecognitionProvider, ResponseStream,
};
pub use bridge::{BridgeConfig, StreamingBridge};
pub use messages::{
    word_count, AudioFrame, RecognitionAlternative, RecognitionConfig, RecognitionResponse,
    RecognitionResult, TranscriptEvent, WordInfo,
};
pub use mock::MockRecognizer;
