use crate::speech::word_count;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Configuration for speaker fragment stitching
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// A stashed fragment older than this is treated as absent
    pub timeout: Duration,
    /// Final fragments with fewer words are not stashed
    pub min_words: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            min_words: 2,
        }
    }
}

#[derive(Debug, Clone)]
struct StashedFragment {
    fragment: String,
    stored_at: Instant,
}

/// Re-attaches speech a speaker resumes after being interrupted.
///
/// Holds at most one fragment per speaker. Only the last speaker to
/// finalize is tracked, so a fragment is eligible for stitching whenever
/// the immediately preceding final event came from someone else.
pub struct SpeakerContext {
    config: ContextConfig,
    entries: HashMap<i32, StashedFragment>,
    last_speaker: Option<i32>,
}

impl SpeakerContext {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            last_speaker: None,
        }
    }

    /// Returns the text to forward, stitched with the speaker's stashed
    /// fragment when they resume after an interruption.
    ///
    /// Interim events and events without a speaker pass through untouched.
    pub fn reconcile(&mut self, speaker_tag: Option<i32>, text: &str, is_final: bool) -> String {
        let Some(speaker) = speaker_tag else {
            return text.to_string();
        };
        if !is_final {
            return text.to_string();
        }

        let now = Instant::now();
        let interrupted = self.last_speaker.is_some_and(|last| last != speaker);

        let mut stitched = text.trim().to_string();
        if let Some(entry) = self.entries.remove(&speaker) {
            let live = now.duration_since(entry.stored_at) <= self.config.timeout;
            if live && interrupted {
                debug!(speaker, "Stitching resumed fragment");
                stitched = format!("{} {}", entry.fragment, stitched);
            } else if live {
                // Same speaker continuing: the new text replaces the entry below
                self.entries.insert(speaker, entry);
            }
        }

        if word_count(&stitched) >= self.config.min_words {
            self.entries.insert(
                speaker,
                StashedFragment {
                    fragment: stitched.clone(),
                    stored_at: now,
                },
            );
        }
        self.last_speaker = Some(speaker);

        stitched
    }

    /// Fragments currently stashed, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SpeakerContext {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}
