use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Accepted,
    Active,
    Closing,
    Closed,
}

/// Why a session left the active state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Client closed the connection or the transport failed
    Disconnected,
    /// Usage limit reached (at accept time or while streaming)
    LimitExceeded,
    /// Recognition bridge finished on its own (terminal backend error)
    RecognitionEnded,
    /// Session could not start its recognition bridge
    Failed,
}

/// Statistics about a finished session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    /// When the session was accepted
    pub started_at: DateTime<Utc>,

    /// Wall-clock duration in seconds
    pub duration_secs: f64,

    /// Usage ledger total for this session id after closing
    pub usage_secs: f64,

    pub close_reason: CloseReason,

    /// Number of finalized transcript segments
    pub transcript_segments_count: usize,
}

/// A finalized transcript fragment kept for summaries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Stitched text
    pub text: String,

    /// Diarization tag, if the backend assigned one
    pub speaker: Option<i32>,

    /// When this segment was finalized
    pub timestamp: DateTime<Utc>,
}
