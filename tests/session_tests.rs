// Integration tests for the live session orchestrator
//
// These tests drive a `LiveSession` end to end: inbound audio goes through
// the streaming bridge to a simulated recognizer, transcripts are stitched
// and enriched, and every outbound event is collected from the channel.

use anyhow::Result;
use futures::channel::mpsc as client;
use langbridge::cache::{CacheConfig, TranslationCache};
use langbridge::generation::{Assistant, MockGenerator};
use langbridge::protocol::{OutboundEvent, SessionEvent, LIMIT_EXCEEDED};
use langbridge::session::{CloseReason, InboundMessage, LiveSession, SessionConfig, SessionServices};
use langbridge::speech::{
    AudioRequests, MockRecognizer, RecognitionAlternative, RecognitionBackend, RecognitionConfig,
    RecognitionError, RecognitionResponse, RecognitionResult, ResponseStream, WordInfo,
};
use langbridge::usage::UsageLedger;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(5);

/// Emits the next scripted final result for every audio chunk, taking
/// `delay` per response
struct ScriptedRecognizer {
    script: Vec<(i32, &'static str)>,
    delay: Duration,
}

impl RecognitionBackend for ScriptedRecognizer {
    fn streaming_recognize(
        &self,
        _config: &RecognitionConfig,
        requests: AudioRequests,
    ) -> Result<ResponseStream, RecognitionError> {
        let script = self.script.clone();
        let delay = self.delay;
        let responses = requests.enumerate().filter_map(move |(i, _)| {
            let (speaker, text) = *script.get(i)?;
            std::thread::sleep(delay);
            let words = text
                .split_whitespace()
                .map(|w| WordInfo {
                    word: w.to_string(),
                    speaker_tag: speaker,
                })
                .collect();
            Some(Ok(RecognitionResponse {
                results: vec![RecognitionResult {
                    alternatives: vec![RecognitionAlternative {
                        transcript: text.to_string(),
                        words,
                    }],
                    is_final: true,
                }],
            }))
        });
        Ok(Box::new(responses))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn services(recognizer: Arc<dyn RecognitionBackend>) -> SessionServices {
    SessionServices {
        recognizer,
        assistant: Arc::new(Assistant::new(Arc::new(MockGenerator::new()))),
        cache: Arc::new(TranslationCache::new(CacheConfig::default())),
        usage: Arc::new(UsageLedger::new()),
    }
}

fn session_config(session_id: &str) -> SessionConfig {
    let mut config = SessionConfig {
        session_id: session_id.to_string(),
        ..SessionConfig::default()
    };
    config.bridge.reconnect_backoff = Duration::from_millis(10);
    config
}

async fn next_session_event(rx: &mut mpsc::Receiver<OutboundEvent>) -> SessionEvent {
    match tokio::time::timeout(WAIT, rx.recv()).await {
        Ok(Some(OutboundEvent::Session(event))) => event,
        other => panic!("expected a session event, got {:?}", other),
    }
}

#[derive(Default)]
struct Tally {
    finals: Vec<String>,
    translations: usize,
    replies: usize,
}

impl Tally {
    fn record(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Transcript { text, is_final, .. } if is_final => self.finals.push(text),
            SessionEvent::TranslationOnly { .. } => self.translations += 1,
            SessionEvent::RepliesOnly { .. } => self.replies += 1,
            _ => {}
        }
    }

    fn complete(&self, n: usize) -> bool {
        self.finals.len() == n && self.translations == n && self.replies == n
    }
}

#[tokio::test]
async fn test_end_to_end_transcripts_enrichment_and_summary() -> Result<()> {
    let services = services(Arc::new(MockRecognizer::new(1)));
    let usage = services.usage.clone();
    let session = LiveSession::new(session_config("e2e"), services);

    let (in_tx, in_rx) = client::unbounded();
    let (out_tx, mut out_rx) = mpsc::channel(64);
    let handle = tokio::spawn(session.run(in_rx, out_tx));

    for _ in 0..3 {
        in_tx.unbounded_send(InboundMessage::Audio(vec![0u8; 3200]))?;
    }

    let mut tally = Tally::default();
    while !tally.complete(3) {
        tally.record(next_session_event(&mut out_rx).await);
    }
    assert_eq!(
        tally.finals,
        vec!["Simulated text 1", "Simulated text 2", "Simulated text 3"]
    );

    in_tx.unbounded_send(InboundMessage::Text(r#"{"type":"request_summary"}"#.to_string()))?;
    loop {
        if let SessionEvent::Summary { summary } = next_session_event(&mut out_rx).await {
            assert_eq!(summary, "- Simulated text 1 Simulated text 2 Simulated text 3");
            break;
        }
    }

    in_tx.unbounded_send(InboundMessage::Close)?;
    let stats = tokio::time::timeout(WAIT, handle).await??;

    assert_eq!(stats.close_reason, CloseReason::Disconnected);
    assert_eq!(stats.transcript_segments_count, 3);

    let snapshot = usage.snapshot("e2e").expect("usage recorded");
    assert!(!snapshot.active);
    Ok(())
}

#[tokio::test]
async fn test_interrupted_speaker_is_stitched_in_transcripts() -> Result<()> {
    let recognizer = ScriptedRecognizer {
        script: vec![
            (1, "hello there"),
            (2, "sorry to interrupt"),
            (1, "how are you"),
        ],
        delay: Duration::ZERO,
    };
    let session = LiveSession::new(session_config("stitch"), services(Arc::new(recognizer)));

    let (in_tx, in_rx) = client::unbounded();
    let (out_tx, mut out_rx) = mpsc::channel(64);
    let handle = tokio::spawn(session.run(in_rx, out_tx));

    for _ in 0..3 {
        in_tx.unbounded_send(InboundMessage::Audio(vec![1u8; 320]))?;
    }

    let mut finals = Vec::new();
    while finals.len() < 3 {
        if let SessionEvent::Transcript {
            text,
            is_final: true,
            speaker,
            ..
        } = next_session_event(&mut out_rx).await
        {
            finals.push((speaker, text));
        }
    }

    assert_eq!(
        finals,
        vec![
            (Some(1), "hello there".to_string()),
            (Some(2), "sorry to interrupt".to_string()),
            (Some(1), "hello there how are you".to_string()),
        ]
    );

    drop(in_tx);
    let stats = tokio::time::timeout(WAIT, handle).await??;
    assert_eq!(stats.close_reason, CloseReason::Disconnected);
    Ok(())
}

#[tokio::test]
async fn test_transcripts_queued_at_close_are_stitched_and_enriched() -> Result<()> {
    let recognizer = ScriptedRecognizer {
        script: vec![
            (1, "hello there friend"),
            (2, "sorry to interrupt"),
            (1, "how are you"),
        ],
        delay: Duration::from_millis(100),
    };
    let session = LiveSession::new(session_config("slow-close"), services(Arc::new(recognizer)));

    let (in_tx, in_rx) = client::unbounded();
    let (out_tx, mut out_rx) = mpsc::channel(64);
    let handle = tokio::spawn(session.run(in_rx, out_tx));

    for _ in 0..3 {
        in_tx.unbounded_send(InboundMessage::Audio(vec![1u8; 320]))?;
    }
    // Leave before the recognizer has produced anything
    in_tx.unbounded_send(InboundMessage::Close)?;

    let stats = tokio::time::timeout(WAIT, handle).await??;
    assert_eq!(stats.close_reason, CloseReason::Disconnected);
    assert_eq!(stats.transcript_segments_count, 3);

    // Final enrichment outlives the session; the channel closes after it
    let mut tally = Tally::default();
    while let Ok(Some(event)) = tokio::time::timeout(WAIT, out_rx.recv()).await {
        if let OutboundEvent::Session(event) = event {
            tally.record(event);
        }
    }

    assert_eq!(
        tally.finals,
        vec![
            "hello there friend",
            "sorry to interrupt",
            "hello there friend how are you"
        ]
    );
    assert_eq!(tally.translations, 3);
    assert_eq!(tally.replies, 3);
    Ok(())
}

#[tokio::test]
async fn test_limit_reached_before_accept() -> Result<()> {
    let services = services(Arc::new(MockRecognizer::new(1)));
    let usage = services.usage.clone();
    let config = SessionConfig {
        usage_limit_secs: 0.0,
        ..session_config("over-limit")
    };

    let (_in_tx, in_rx) = client::unbounded::<InboundMessage>();
    let (out_tx, mut out_rx) = mpsc::channel(8);
    let stats = LiveSession::new(config, services).run(in_rx, out_tx).await;

    assert_eq!(stats.close_reason, CloseReason::LimitExceeded);
    match out_rx.recv().await {
        Some(OutboundEvent::Error(e)) => assert_eq!(e.error, LIMIT_EXCEEDED),
        other => panic!("expected limit error, got {:?}", other),
    }
    assert!(out_rx.recv().await.is_none());
    // Rejected sessions never open a usage segment
    assert!(usage.snapshot("over-limit").is_none());
    Ok(())
}

#[tokio::test]
async fn test_limit_reached_while_streaming() -> Result<()> {
    let services = services(Arc::new(MockRecognizer::new(100)));
    let usage = services.usage.clone();
    let config = SessionConfig {
        usage_limit_secs: 0.05,
        ..session_config("streaming-limit")
    };

    let (in_tx, in_rx) = client::unbounded();
    let (out_tx, mut out_rx) = mpsc::channel(64);
    let handle = tokio::spawn(LiveSession::new(config, services).run(in_rx, out_tx));

    in_tx.unbounded_send(InboundMessage::Audio(vec![0u8; 320]))?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    in_tx.unbounded_send(InboundMessage::Audio(vec![0u8; 320]))?;

    let stats = tokio::time::timeout(WAIT, handle).await??;
    assert_eq!(stats.close_reason, CloseReason::LimitExceeded);
    assert!(stats.usage_secs >= 0.05);

    let mut saw_limit = false;
    while let Some(event) = out_rx.recv().await {
        if let OutboundEvent::Error(e) = event {
            assert_eq!(e.error, LIMIT_EXCEEDED);
            saw_limit = true;
        }
    }
    assert!(saw_limit);
    assert!(!usage.snapshot("streaming-limit").expect("usage recorded").active);
    Ok(())
}

#[tokio::test]
async fn test_ping_and_unknown_text_are_ignored() -> Result<()> {
    let session = LiveSession::new(
        session_config("quiet"),
        services(Arc::new(MockRecognizer::new(1))),
    );

    let (in_tx, in_rx) = client::unbounded();
    let (out_tx, mut out_rx) = mpsc::channel(8);
    let handle = tokio::spawn(session.run(in_rx, out_tx));

    in_tx.unbounded_send(InboundMessage::Text(r#"{"type":"ping"}"#.to_string()))?;
    in_tx.unbounded_send(InboundMessage::Text("not json at all".to_string()))?;
    in_tx.unbounded_send(InboundMessage::Text(r#"{"type":"dance"}"#.to_string()))?;
    in_tx.unbounded_send(InboundMessage::Close)?;

    let stats = tokio::time::timeout(WAIT, handle).await??;
    assert_eq!(stats.close_reason, CloseReason::Disconnected);
    assert_eq!(stats.transcript_segments_count, 0);
    assert!(out_rx.recv().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_summary_without_transcript() -> Result<()> {
    let session = LiveSession::new(
        session_config("empty-summary"),
        services(Arc::new(MockRecognizer::new(1))),
    );

    let (in_tx, in_rx) = client::unbounded();
    let (out_tx, mut out_rx) = mpsc::channel(8);
    let handle = tokio::spawn(session.run(in_rx, out_tx));

    in_tx.unbounded_send(InboundMessage::Text(r#"{"type":"request_summary"}"#.to_string()))?;
    match next_session_event(&mut out_rx).await {
        SessionEvent::Summary { summary } => assert!(!summary.is_empty()),
        other => panic!("expected summary, got {:?}", other),
    }

    in_tx.unbounded_send(InboundMessage::Close)?;
    tokio::time::timeout(WAIT, handle).await??;
    Ok(())
}
