use super::backend::{AudioRequests, RecognitionBackend, RecognitionError, ResponseStream};
use super::messages::{
    RecognitionAlternative, RecognitionConfig, RecognitionResponse, RecognitionResult, WordInfo,
};

/// Simulated recognizer used when no speech provider is configured.
///
/// Every audio chunk yields an interim result; every `final_every`-th chunk
/// yields a final result "Simulated text N" attributed to speaker 1.
pub struct MockRecognizer {
    final_every: usize,
}

impl MockRecognizer {
    pub fn new(final_every: usize) -> Self {
        Self {
            final_every: final_every.max(1),
        }
    }
}

impl RecognitionBackend for MockRecognizer {
    fn streaming_recognize(
        &self,
        _config: &RecognitionConfig,
        requests: AudioRequests,
    ) -> Result<ResponseStream, RecognitionError> {
        let final_every = self.final_every;
        let responses = requests.enumerate().map(move |(i, _chunk)| {
            let count = i + 1;
            let response = if count % final_every == 0 {
                let transcript = format!("Simulated text {}", count);
                let words = transcript
                    .split_whitespace()
                    .map(|w| WordInfo {
                        word: w.to_string(),
                        speaker_tag: 1,
                    })
                    .collect();
                single(transcript, words, true)
            } else {
                single("Simulated...".to_string(), Vec::new(), false)
            };
            Ok(response)
        });

        Ok(Box::new(responses))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn single(transcript: String, words: Vec<WordInfo>, is_final: bool) -> RecognitionResponse {
    RecognitionResponse {
        results: vec![RecognitionResult {
            alternatives: vec![RecognitionAlternative { transcript, words }],
            is_final,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_emits_final_every_n_chunks() {
        let recognizer = MockRecognizer::new(3);
        let requests: AudioRequests = Box::new((0..6).map(|_| vec![0u8; 320]));
        let events: Vec<_> = recognizer
            .streaming_recognize(&RecognitionConfig::default(), requests)
            .unwrap()
            .map(|r| r.unwrap().to_event().unwrap())
            .collect();

        assert_eq!(events.len(), 6);
        let finals: Vec<_> = events.iter().filter(|e| e.is_final).collect();
        assert_eq!(finals.len(), 2);
        assert_eq!(finals[0].text, "Simulated text 3");
        assert_eq!(finals[0].speaker_tag, Some(1));
        assert_eq!(events[0].text, "Simulated...");
    }
}
