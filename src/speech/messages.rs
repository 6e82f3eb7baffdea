use serde::{Deserialize, Serialize};

/// Audio handed from the session to the streaming bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioFrame {
    /// Raw audio bytes (LINEAR16, sample rate agreed with the client)
    Chunk(Vec<u8>),
    /// Closes the recognition stream; nothing after it is read
    EndOfStream,
}

/// A transcript update produced by the streaming bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
    /// Diarization tag of the first tagged word (final results only)
    pub speaker_tag: Option<i32>,
    /// Synthetic event reporting a terminal recognition failure
    #[serde(default)]
    pub error: bool,
}

impl TranscriptEvent {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
            speaker_tag: None,
            error: false,
        }
    }

    pub fn final_result(text: impl Into<String>, speaker_tag: Option<i32>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            speaker_tag,
            error: false,
        }
    }

    pub fn backend_error(message: &str) -> Self {
        Self {
            text: format!("[Error: {}]", message),
            is_final: true,
            speaker_tag: None,
            error: true,
        }
    }

    pub fn word_count(&self) -> usize {
        word_count(&self.text)
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Static configuration sent with every streaming recognition call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionConfig {
    pub sample_rate_hertz: u32,
    pub language_code: String,
    pub interim_results: bool,
    pub enable_automatic_punctuation: bool,
    pub enable_speaker_diarization: bool,
    pub min_speaker_count: u32,
    pub max_speaker_count: u32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            sample_rate_hertz: 16000,
            language_code: "es-ES".to_string(),
            interim_results: true,
            enable_automatic_punctuation: true,
            enable_speaker_diarization: true,
            min_speaker_count: 2,
            max_speaker_count: 6,
        }
    }
}

/// One response from the recognition backend's response stream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognitionResponse {
    pub results: Vec<RecognitionResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub alternatives: Vec<RecognitionAlternative>,
    pub is_final: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognitionAlternative {
    pub transcript: String,
    /// Per-word diarization; populated on final results only
    #[serde(default)]
    pub words: Vec<WordInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordInfo {
    pub word: String,
    /// 0 means the backend did not assign a speaker
    pub speaker_tag: i32,
}

impl RecognitionResponse {
    /// Convert the response into a transcript event.
    ///
    /// Only the first result and its top alternative are used. Responses
    /// without either are skipped.
    pub fn to_event(&self) -> Option<TranscriptEvent> {
        let result = self.results.first()?;
        let alternative = result.alternatives.first()?;

        if result.is_final {
            Some(TranscriptEvent::final_result(
                alternative.transcript.clone(),
                first_speaker(&alternative.words),
            ))
        } else {
            Some(TranscriptEvent::interim(alternative.transcript.clone()))
        }
    }
}

/// Speaker of the first recognized word carrying a tag; 0 means untagged
fn first_speaker(words: &[WordInfo]) -> Option<i32> {
    words
        .iter()
        .map(|w| w.speaker_tag)
        .find(|&tag| tag > 0)
}
