use super::config::SessionConfig;
use super::context::SpeakerContext;
use super::stats::{CloseReason, SessionState, SessionStats, TranscriptSegment};
use crate::cache::TranslationCache;
use crate::enrichment::EnrichmentPipeline;
use crate::generation::{Assistant, Generated, Translation, SUMMARY_FALLBACK};
use crate::protocol::{ClientCommand, GenerationScope, OutboundEvent};
use crate::speech::{AudioFrame, RecognitionBackend, StreamingBridge, TranscriptEvent};
use crate::usage::UsageLedger;
use chrono::Utc;
use futures::stream::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Message read from the client transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Binary frame: raw audio
    Audio(Vec<u8>),
    /// Text frame: JSON command
    Text(String),
    /// Client closed the connection or the transport failed
    Close,
}

/// Process-wide collaborators shared by every session
#[derive(Clone)]
pub struct SessionServices {
    pub recognizer: Arc<dyn RecognitionBackend>,
    pub assistant: Arc<Assistant>,
    pub cache: Arc<TranslationCache<Translation>>,
    pub usage: Arc<UsageLedger>,
}

/// Ends the usage segment exactly once, whichever way the session exits
struct UsageGuard {
    ledger: Arc<UsageLedger>,
    session_id: String,
}

impl UsageGuard {
    fn start(ledger: Arc<UsageLedger>, session_id: &str) -> Self {
        ledger.start_session(session_id);
        Self {
            ledger,
            session_id: session_id.to_string(),
        }
    }
}

impl Drop for UsageGuard {
    fn drop(&mut self) {
        self.ledger.end_session(&self.session_id);
    }
}

/// One live translation session per client connection.
///
/// Drives the streaming bridge with inbound audio, stitches and forwards
/// transcripts, dispatches enrichment and answers summary requests.
pub struct LiveSession {
    config: SessionConfig,
    services: SessionServices,
    context: SpeakerContext,
    /// Finalized fragments, append-only
    transcript: Vec<TranscriptSegment>,
    started_at: chrono::DateTime<Utc>,
    state: SessionState,
}

impl LiveSession {
    pub fn new(config: SessionConfig, services: SessionServices) -> Self {
        let context = SpeakerContext::new(config.context.clone());
        Self {
            config,
            services,
            context,
            transcript: Vec::new(),
            started_at: Utc::now(),
            state: SessionState::Accepted,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session until the client leaves, the usage limit is hit or
    /// recognition ends; then close the bridge and the usage segment.
    pub async fn run<S>(mut self, mut inbound: S, outbound: mpsc::Sender<OutboundEvent>) -> SessionStats
    where
        S: Stream<Item = InboundMessage> + Unpin,
    {
        let session_id = self.config.session_id.clone();
        let limit = self.config.usage_limit_secs;

        if self.services.usage.is_limit_exceeded(&session_id, limit) {
            info!(session_id = %session_id, "Usage limit already reached, rejecting session");
            let _ = outbound.send(OutboundEvent::limit_exceeded(limit)).await;
            return self.close(CloseReason::LimitExceeded);
        }

        let usage = UsageGuard::start(Arc::clone(&self.services.usage), &session_id);

        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        let mut bridge = match StreamingBridge::open(
            session_id.clone(),
            Arc::clone(&self.services.recognizer),
            self.config.bridge.clone(),
            audio_rx,
        ) {
            Ok(bridge) => bridge,
            Err(e) => {
                error!(session_id = %session_id, "Failed to open streaming bridge: {:#}", e);
                drop(usage);
                return self.close(CloseReason::Failed);
            }
        };

        let mut pipeline = EnrichmentPipeline::new(
            session_id.clone(),
            self.config.enrichment.clone(),
            Arc::clone(&self.services.assistant),
            Arc::clone(&self.services.cache),
            outbound.clone(),
        );

        self.state = SessionState::Active;
        info!(session_id = %session_id, "Session active");

        let reason = self
            .active(&mut inbound, &outbound, &audio_tx, &mut bridge, &mut pipeline)
            .await;

        self.state = SessionState::Closing;
        info!(session_id = %session_id, ?reason, "Session closing");

        let _ = audio_tx.send(AudioFrame::EndOfStream);

        // Transcripts still queued in the bridge are stitched, recorded and
        // enriched like any other; delivery is best effort
        let mut drained = 0usize;
        while let Some(event) = bridge.next_event().await {
            drained += 1;
            self.handle_transcript(event, &outbound, &mut pipeline).await;
        }
        if drained > 0 {
            debug!(session_id = %session_id, drained, "Handled transcripts after close");
        }

        pipeline.shutdown();
        drop(usage);
        self.close(reason)
    }

    async fn active<S>(
        &mut self,
        inbound: &mut S,
        outbound: &mpsc::Sender<OutboundEvent>,
        audio_tx: &mpsc::UnboundedSender<AudioFrame>,
        bridge: &mut StreamingBridge,
        pipeline: &mut EnrichmentPipeline,
    ) -> CloseReason
    where
        S: Stream<Item = InboundMessage> + Unpin,
    {
        let limit = self.config.usage_limit_secs;

        loop {
            tokio::select! {
                message = inbound.next() => match message {
                    Some(InboundMessage::Audio(bytes)) => {
                        let session_id = self.session_id();
                        self.services.usage.update(session_id);
                        if self.services.usage.is_limit_exceeded(session_id, limit) {
                            warn!(session_id = %session_id, "Usage limit reached");
                            let _ = outbound.send(OutboundEvent::limit_exceeded(limit)).await;
                            return CloseReason::LimitExceeded;
                        }
                        if audio_tx.send(AudioFrame::Chunk(bytes)).is_err() {
                            return CloseReason::RecognitionEnded;
                        }
                    }
                    Some(InboundMessage::Text(text)) => self.handle_command(&text, outbound),
                    Some(InboundMessage::Close) | None => return CloseReason::Disconnected,
                },
                event = bridge.next_event() => match event {
                    Some(event) => {
                        if !self.handle_transcript(event, outbound, pipeline).await {
                            return CloseReason::Disconnected;
                        }
                    }
                    None => return CloseReason::RecognitionEnded,
                },
            }
        }
    }

    /// Stitch, record, forward and enrich one transcript event.
    /// Returns `false` once the client can no longer be reached; nothing is
    /// enriched for it then.
    async fn handle_transcript(
        &mut self,
        event: TranscriptEvent,
        outbound: &mpsc::Sender<OutboundEvent>,
        pipeline: &mut EnrichmentPipeline,
    ) -> bool {
        let event = if event.error {
            event
        } else {
            let text = self
                .context
                .reconcile(event.speaker_tag, &event.text, event.is_final);
            TranscriptEvent { text, ..event }
        };

        if event.is_final && !event.error && !event.text.trim().is_empty() {
            self.transcript.push(TranscriptSegment {
                text: event.text.clone(),
                speaker: event.speaker_tag,
                timestamp: Utc::now(),
            });
        }

        if outbound.send(OutboundEvent::transcript(&event)).await.is_err() {
            return false;
        }

        pipeline.on_transcript(&event);
        true
    }

    fn handle_command(&self, text: &str, outbound: &mpsc::Sender<OutboundEvent>) {
        match ClientCommand::parse(text) {
            Some(ClientCommand::Ping) => {}
            Some(ClientCommand::RequestSummary) => {
                info!(session_id = %self.session_id(), "Summary requested");
                let excerpt = self.transcript_excerpt();
                let assistant = Arc::clone(&self.services.assistant);
                let outbound = outbound.clone();
                tokio::spawn(async move {
                    let event = summarize(&assistant, &excerpt).await;
                    let _ = outbound.send(event).await;
                });
            }
            None => debug!(session_id = %self.session_id(), "Ignoring unrecognized text frame"),
        }
    }

    /// Most recent `summary_max_chars` characters of the finalized transcript
    pub fn transcript_excerpt(&self) -> String {
        let full = self
            .transcript
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        tail_chars(&full, self.config.summary_max_chars).to_string()
    }

    fn close(&mut self, reason: CloseReason) -> SessionStats {
        self.state = SessionState::Closed;
        let duration = Utc::now().signed_duration_since(self.started_at);

        info!(
            session_id = %self.config.session_id,
            ?reason,
            segments = self.transcript.len(),
            "Session closed"
        );

        SessionStats {
            session_id: self.config.session_id.clone(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            usage_secs: self.services.usage.accumulated(&self.config.session_id),
            close_reason: reason,
            transcript_segments_count: self.transcript.len(),
        }
    }
}

async fn summarize(assistant: &Assistant, excerpt: &str) -> OutboundEvent {
    if excerpt.trim().is_empty() {
        return OutboundEvent::summary("No transcript yet.");
    }

    match assistant.summarize(excerpt).await {
        Generated::Ready(summary) => OutboundEvent::summary(summary),
        Generated::QuotaExceeded => OutboundEvent::quota_exceeded(GenerationScope::Summary, None),
        Generated::Malformed(_) => OutboundEvent::summary(SUMMARY_FALLBACK),
    }
}

/// Suffix of at most `max_chars` characters, split on a char boundary
fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    match text.char_indices().nth(count - max_chars) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_chars() {
        assert_eq!(tail_chars("hello", 10), "hello");
        assert_eq!(tail_chars("hello world", 5), "world");
        assert_eq!(tail_chars("añoñ", 2), "oñ");
        assert_eq!(tail_chars("abc", 0), "");
    }
}
