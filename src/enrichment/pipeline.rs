use crate::cache::TranslationCache;
use crate::generation::{Assistant, Generated, Translation};
use crate::protocol::{GenerationScope, OutboundEvent};
use crate::speech::TranscriptEvent;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Configuration for transcript enrichment
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Transcripts with fewer words are not sent to the generation backend
    pub min_words: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self { min_words: 3 }
    }
}

/// The most recently dispatched request pair
struct PendingEnrichment {
    is_final: bool,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Per-session dispatcher of translation and smart-reply requests.
///
/// A speculative (interim) request is cancelled when a newer interim
/// transcript arrives. Requests for final transcripts are never cancelled.
pub struct EnrichmentPipeline {
    session_id: String,
    config: EnrichmentConfig,
    assistant: Arc<Assistant>,
    cache: Arc<TranslationCache<Translation>>,
    outbound: mpsc::Sender<OutboundEvent>,
    pending: Option<PendingEnrichment>,
}

impl EnrichmentPipeline {
    pub fn new(
        session_id: impl Into<String>,
        config: EnrichmentConfig,
        assistant: Arc<Assistant>,
        cache: Arc<TranslationCache<Translation>>,
        outbound: mpsc::Sender<OutboundEvent>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            config,
            assistant,
            cache,
            outbound,
            pending: None,
        }
    }

    /// Dispatch enrichment for a transcript update.
    ///
    /// Returns whether requests were dispatched. Results are pushed to the
    /// outbound channel from a background task as each becomes ready.
    pub fn on_transcript(&mut self, event: &TranscriptEvent) -> bool {
        if event.error {
            return false;
        }

        let words = event.word_count();
        if words < self.config.min_words {
            debug!(
                session_id = %self.session_id,
                words,
                "Skipping enrichment for short phrase"
            );
            return false;
        }

        if let Some(previous) = self.pending.take() {
            let superseded = !event.is_final && !previous.is_final;
            if superseded && !previous.handle.is_finished() {
                debug!(session_id = %self.session_id, "Cancelling superseded speculative enrichment");
                previous.cancel.cancel();
            }
        }

        let cancel = CancellationToken::new();
        let job = EnrichmentJob {
            session_id: self.session_id.clone(),
            text: event.text.clone(),
            is_final: event.is_final,
            assistant: Arc::clone(&self.assistant),
            cache: Arc::clone(&self.cache),
            outbound: self.outbound.clone(),
            cancel: cancel.clone(),
        };

        self.pending = Some(PendingEnrichment {
            is_final: event.is_final,
            cancel,
            handle: tokio::spawn(job.run()),
        });

        true
    }

    /// Cancel an outstanding speculative request; final requests keep running
    pub fn shutdown(&mut self) {
        if let Some(pending) = self.pending.take() {
            if !pending.is_final {
                pending.cancel.cancel();
            }
        }
    }
}

impl Drop for EnrichmentPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct EnrichmentJob {
    session_id: String,
    text: String,
    is_final: bool,
    assistant: Arc<Assistant>,
    cache: Arc<TranslationCache<Translation>>,
    outbound: mpsc::Sender<OutboundEvent>,
    cancel: CancellationToken,
}

impl EnrichmentJob {
    async fn run(self) {
        debug!(
            session_id = %self.session_id,
            is_final = self.is_final,
            "Enrichment started"
        );

        // Both requests run concurrently; the translation is pushed as soon
        // as it is ready, the replies after it.
        let translation = async {
            if let Some(event) = self.translation().await {
                self.emit(event).await;
            }
        };
        let replies = async {
            if self.is_final {
                self.replies().await
            } else {
                None
            }
        };

        let ((), replies) = tokio::join!(translation, replies);
        if let Some(event) = replies {
            self.emit(event).await;
        }

        if self.cancel.is_cancelled() {
            info!(session_id = %self.session_id, "Enrichment cancelled");
        }
    }

    async fn translation(&self) -> Option<OutboundEvent> {
        if let Some(hit) = self.cache.get(&self.text) {
            debug!(session_id = %self.session_id, "Translation cache hit");
            return Some(OutboundEvent::translation(&self.text, hit.translation));
        }

        let event = match self.cancellable(self.assistant.translate(&self.text)).await? {
            Generated::Ready(translation) => {
                self.cache.put(&self.text, translation.clone());
                OutboundEvent::translation(&self.text, translation.translation)
            }
            Generated::QuotaExceeded => {
                OutboundEvent::quota_exceeded(GenerationScope::Translation, Some(self.text.clone()))
            }
            Generated::Malformed(_) => {
                OutboundEvent::translation(&self.text, Translation::fallback(&self.text).translation)
            }
        };
        Some(event)
    }

    async fn replies(&self) -> Option<OutboundEvent> {
        let event = match self.cancellable(self.assistant.smart_replies(&self.text)).await? {
            Generated::Ready(replies) => OutboundEvent::replies(replies),
            Generated::QuotaExceeded => {
                OutboundEvent::quota_exceeded(GenerationScope::Replies, Some(self.text.clone()))
            }
            Generated::Malformed(_) => OutboundEvent::replies(Vec::new()),
        };
        Some(event)
    }

    /// `None` if the job is cancelled before `fut` completes
    async fn cancellable<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            output = fut => Some(output),
        }
    }

    async fn emit(&self, event: OutboundEvent) {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {}
            sent = self.outbound.send(event) => {
                if sent.is_err() {
                    debug!(session_id = %self.session_id, "Outbound channel closed, dropping enrichment");
                }
            }
        }
    }
}
