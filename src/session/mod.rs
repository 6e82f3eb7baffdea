//! Live translation session orchestration
//!
//! This module provides the `LiveSession` abstraction that manages:
//! - Audio intake and usage accounting against the free-tier limit
//! - The streaming recognition bridge for the connection
//! - Speaker fragment stitching across interruptions
//! - Enrichment dispatch and on-demand summaries

mod config;
mod context;
mod session;
mod stats;

pub use config::SessionConfig;
pub use context::{ContextConfig, SpeakerContext};
pub use session::{InboundMessage, LiveSession, SessionServices};
pub use stats::{CloseReason, SessionState, SessionStats, TranscriptSegment};
