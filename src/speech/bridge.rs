//! Streaming bridge between the async session and a blocking recognizer
//!
//! Audio flows session → unbounded tokio channel → feeder task → crossbeam
//! channel → recognition thread. Transcript events flow back over a bounded
//! tokio channel. The recognition call is reopened after every interruption
//! until the end-of-stream frame has been seen.

use super::backend::{RecognitionBackend, RecognitionError, ResponseStream};
use super::messages::{AudioFrame, RecognitionConfig, TranscriptEvent};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const EVENT_BUFFER: usize = 64;

/// Configuration for a streaming bridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Sent with every (re)opened recognition call
    pub recognition: RecognitionConfig,
    /// Pause before reopening an interrupted recognition call
    pub reconnect_backoff: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            recognition: RecognitionConfig::default(),
            reconnect_backoff: Duration::from_secs(1),
        }
    }
}

/// Per-session bridge owning the recognition thread
pub struct StreamingBridge {
    session_id: String,
    events_rx: mpsc::Receiver<TranscriptEvent>,
    feeder: Option<JoinHandle<()>>,
    worker: Option<std::thread::JoinHandle<()>>,
    /// Join of the recognition thread in progress; survives a cancelled
    /// `next_event` so the next call resumes it
    joining: Option<JoinHandle<std::thread::Result<()>>>,
}

impl StreamingBridge {
    /// Start the feeder task and the recognition thread
    pub fn open(
        session_id: impl Into<String>,
        backend: Arc<dyn RecognitionBackend>,
        config: BridgeConfig,
        audio_rx: mpsc::UnboundedReceiver<AudioFrame>,
    ) -> Result<Self> {
        let session_id = session_id.into();
        let (bridge_tx, bridge_rx) = crossbeam_channel::unbounded::<AudioFrame>();
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let progress = Arc::new(StreamProgress::default());

        let worker = {
            let recognizer = Recognizer {
                session_id: session_id.clone(),
                backend,
                config,
                bridge_rx,
                events_tx,
                progress: Arc::clone(&progress),
            };
            std::thread::Builder::new()
                .name(format!("recognizer-{}", session_id))
                .spawn(move || recognizer.run())
                .context("Failed to spawn recognition thread")?
        };

        let feeder = tokio::spawn(feed_audio(audio_rx, bridge_tx, progress));

        info!(session_id = %session_id, "Streaming bridge opened");

        Ok(Self {
            session_id,
            events_rx,
            feeder: Some(feeder),
            worker: Some(worker),
            joining: None,
        })
    }

    /// Next transcript event.
    ///
    /// Returns `None` once the recognition thread has finished and been
    /// joined; every event it produced has been returned by then.
    pub async fn next_event(&mut self) -> Option<TranscriptEvent> {
        match self.events_rx.recv().await {
            Some(event) => Some(event),
            None => {
                self.join().await;
                None
            }
        }
    }

    async fn join(&mut self) {
        if self.worker.is_none() && self.joining.is_none() && self.feeder.is_none() {
            return;
        }

        if let Some(worker) = self.worker.take() {
            self.joining = Some(tokio::task::spawn_blocking(move || worker.join()));
        }
        if let Some(joining) = self.joining.as_mut() {
            let joined = joining.await;
            self.joining = None;
            match joined {
                Ok(Ok(())) => debug!(session_id = %self.session_id, "Recognition thread joined"),
                Ok(Err(_)) => error!(session_id = %self.session_id, "Recognition thread panicked"),
                Err(e) => error!(session_id = %self.session_id, "Failed to join recognition thread: {}", e),
            }
        }

        // The recognizer may stop on a fatal error while audio is still
        // arriving; anything the feeder still holds is discarded.
        if let Some(feeder) = self.feeder.as_mut() {
            feeder.abort();
            let stopped = feeder.await;
            self.feeder = None;
            if let Err(e) = stopped {
                if e.is_panic() {
                    error!(session_id = %self.session_id, "Audio feeder panicked: {}", e);
                }
            }
        }

        info!(session_id = %self.session_id, "Streaming bridge closed");
    }
}

impl Drop for StreamingBridge {
    fn drop(&mut self) {
        // Dropping the feeder's sender disconnects the recognition thread's
        // request iterator, so the thread exits on its own.
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }
}

/// Shared between the feeder and the recognition thread
#[derive(Default)]
struct StreamProgress {
    /// Feeder has queued the end-of-stream frame
    closing: AtomicBool,
    /// A request iterator has consumed the end-of-stream frame
    finished: AtomicBool,
    /// Chunks handed to the backend so far
    pulled: AtomicUsize,
}

async fn feed_audio(
    mut audio_rx: mpsc::UnboundedReceiver<AudioFrame>,
    bridge_tx: crossbeam_channel::Sender<AudioFrame>,
    progress: Arc<StreamProgress>,
) {
    let mut fed = 0usize;

    while let Some(frame) = audio_rx.recv().await {
        let is_end = frame == AudioFrame::EndOfStream;
        if is_end {
            progress.closing.store(true, Ordering::SeqCst);
        }
        if bridge_tx.send(frame).is_err() {
            debug!("Recognition thread gone, audio feeder stopping");
            return;
        }
        if is_end {
            debug!(fed, "Audio feeder saw end of stream");
            return;
        }

        fed += 1;
        if fed % 50 == 0 {
            debug!(fed, "Fed audio chunks");
        }
    }

    // Session dropped its sender without an explicit end of stream
    progress.closing.store(true, Ordering::SeqCst);
    let _ = bridge_tx.send(AudioFrame::EndOfStream);
}

/// Blocking request iterator handed to the backend
struct AudioRequests {
    bridge_rx: crossbeam_channel::Receiver<AudioFrame>,
    progress: Arc<StreamProgress>,
}

impl Iterator for AudioRequests {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.bridge_rx.recv() {
                Ok(AudioFrame::Chunk(bytes)) if bytes.is_empty() => continue,
                Ok(AudioFrame::Chunk(bytes)) => {
                    self.progress.pulled.fetch_add(1, Ordering::SeqCst);
                    return Some(bytes);
                }
                Ok(AudioFrame::EndOfStream) | Err(_) => {
                    self.progress.finished.store(true, Ordering::SeqCst);
                    return None;
                }
            }
        }
    }
}

enum StreamEnd {
    /// Backend closed its response stream
    Closed(usize),
    Failed(RecognitionError),
    /// Bridge owner is gone; nobody reads events anymore
    Abandoned,
}

struct Recognizer {
    session_id: String,
    backend: Arc<dyn RecognitionBackend>,
    config: BridgeConfig,
    bridge_rx: crossbeam_channel::Receiver<AudioFrame>,
    events_tx: mpsc::Sender<TranscriptEvent>,
    progress: Arc<StreamProgress>,
}

impl Recognizer {
    fn run(self) {
        info!(
            session_id = %self.session_id,
            backend = %self.backend.name(),
            "Recognition thread started"
        );

        let mut attempt = 0usize;
        loop {
            attempt += 1;
            debug!(session_id = %self.session_id, attempt, "Opening recognition stream");

            let pulled_before = self.progress.pulled.load(Ordering::SeqCst);
            let requests = AudioRequests {
                bridge_rx: self.bridge_rx.clone(),
                progress: Arc::clone(&self.progress),
            };

            let end = match self
                .backend
                .streaming_recognize(&self.config.recognition, Box::new(requests))
            {
                Ok(responses) => self.forward(responses),
                Err(e) => StreamEnd::Failed(e),
            };

            match end {
                StreamEnd::Closed(count) => {
                    debug!(session_id = %self.session_id, count, "Recognition stream ended");
                }
                StreamEnd::Failed(e) if e.is_fatal() => {
                    error!(session_id = %self.session_id, "{}", e);
                    let _ = self
                        .events_tx
                        .blocking_send(TranscriptEvent::backend_error(&e.to_string()));
                    break;
                }
                StreamEnd::Failed(e) => {
                    warn!(session_id = %self.session_id, "{}", e);
                }
                StreamEnd::Abandoned => {
                    debug!(session_id = %self.session_id, "Transcript receiver dropped");
                    break;
                }
            }

            if self.progress.finished.load(Ordering::SeqCst) {
                break;
            }

            // Once the session is closing, keep reopening only while the
            // backend is still draining queued audio.
            let made_progress = self.progress.pulled.load(Ordering::SeqCst) > pulled_before;
            if self.progress.closing.load(Ordering::SeqCst) && !made_progress {
                warn!(
                    session_id = %self.session_id,
                    "Recognition stream failed while closing, dropping queued audio"
                );
                break;
            }

            std::thread::sleep(self.config.reconnect_backoff);

            if self.events_tx.is_closed() {
                break;
            }
        }

        info!(session_id = %self.session_id, "Recognition thread stopped");
    }

    fn forward(&self, responses: ResponseStream) -> StreamEnd {
        let mut count = 0usize;

        for response in responses {
            let response = match response {
                Ok(r) => r,
                Err(e) => return StreamEnd::Failed(e),
            };
            count += 1;

            if let Some(event) = response.to_event() {
                if self.events_tx.blocking_send(event).is_err() {
                    return StreamEnd::Abandoned;
                }
            }
        }

        StreamEnd::Closed(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::backend::AudioRequests as Requests;
    use crate::speech::messages::{
        RecognitionAlternative, RecognitionResponse, RecognitionResult,
    };
    use crate::speech::mock::MockRecognizer;
    use futures::FutureExt;
    use std::cell::RefCell;

    fn fast_config() -> BridgeConfig {
        BridgeConfig {
            recognition: RecognitionConfig::default(),
            reconnect_backoff: Duration::from_millis(10),
        }
    }

    fn final_response(text: String) -> RecognitionResponse {
        RecognitionResponse {
            results: vec![RecognitionResult {
                alternatives: vec![RecognitionAlternative {
                    transcript: text,
                    words: Vec::new(),
                }],
                is_final: true,
            }],
        }
    }

    /// Echoes each chunk as a final result; the first call drops after one
    /// response.
    struct FlakyRecognizer {
        calls: AtomicUsize,
    }

    impl RecognitionBackend for FlakyRecognizer {
        fn streaming_recognize(
            &self,
            _config: &RecognitionConfig,
            requests: Requests,
        ) -> Result<ResponseStream, RecognitionError> {
            let echo = requests.map(|chunk| Ok(final_response(String::from_utf8(chunk).unwrap())));
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                let dropped = std::iter::once(Err(RecognitionError::Transient("reset".into())));
                Ok(Box::new(echo.take(1).chain(dropped)))
            } else {
                Ok(Box::new(echo))
            }
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    struct BrokenRecognizer;

    impl RecognitionBackend for BrokenRecognizer {
        fn streaming_recognize(
            &self,
            _config: &RecognitionConfig,
            _requests: Requests,
        ) -> Result<ResponseStream, RecognitionError> {
            Err(RecognitionError::Fatal("invalid credentials".into()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    async fn drain(bridge: &mut StreamingBridge) -> Vec<TranscriptEvent> {
        let mut events = Vec::new();
        while let Some(event) = bridge.next_event().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_bridge_relays_mock_transcripts() {
        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        let backend = Arc::new(MockRecognizer::new(3));
        let mut bridge = StreamingBridge::open("s1", backend, fast_config(), audio_rx).unwrap();

        for _ in 0..6 {
            audio_tx.send(AudioFrame::Chunk(vec![1u8; 320])).unwrap();
        }
        audio_tx.send(AudioFrame::EndOfStream).unwrap();

        let events = drain(&mut bridge).await;
        assert_eq!(events.len(), 6);
        assert_eq!(events.iter().filter(|e| e.is_final).count(), 2);
        assert!(bridge.worker.is_none(), "thread joined before exhaustion");
        assert!(bridge.joining.is_none());
    }

    /// Set from a thread-local destructor, after the recognizer has already
    /// dropped its event sender
    struct SlowExit(Arc<AtomicBool>);

    impl Drop for SlowExit {
        fn drop(&mut self) {
            std::thread::sleep(Duration::from_millis(200));
            self.0.store(true, Ordering::SeqCst);
        }
    }

    thread_local! {
        static EXIT_GUARD: RefCell<Option<SlowExit>> = const { RefCell::new(None) };
    }

    /// Consumes audio without responding; its thread lingers on exit
    struct LingeringRecognizer {
        exited: Arc<AtomicBool>,
    }

    impl RecognitionBackend for LingeringRecognizer {
        fn streaming_recognize(
            &self,
            _config: &RecognitionConfig,
            requests: Requests,
        ) -> Result<ResponseStream, RecognitionError> {
            let guard = SlowExit(Arc::clone(&self.exited));
            EXIT_GUARD.with(|g| *g.borrow_mut() = Some(guard));
            Ok(Box::new(requests.filter_map(|_| {
                None::<Result<RecognitionResponse, RecognitionError>>
            })))
        }

        fn name(&self) -> &str {
            "lingering"
        }
    }

    #[tokio::test]
    async fn test_join_resumes_after_cancelled_poll() {
        let exited = Arc::new(AtomicBool::new(false));
        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        let backend = Arc::new(LingeringRecognizer {
            exited: Arc::clone(&exited),
        });
        let mut bridge = StreamingBridge::open("s5", backend, fast_config(), audio_rx).unwrap();
        audio_tx.send(AudioFrame::EndOfStream).unwrap();

        // Each pending poll is dropped, as a losing select! branch would be
        let mut pending = 0;
        loop {
            match bridge.next_event().now_or_never() {
                Some(None) => break,
                Some(Some(event)) => panic!("unexpected event {:?}", event),
                None => {
                    pending += 1;
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }
        }

        assert!(pending > 0);
        assert!(
            exited.load(Ordering::SeqCst),
            "bridge reported exhaustion before the thread exited"
        );
        assert!(bridge.worker.is_none() && bridge.joining.is_none());
        assert!(bridge.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_bridge_reconnects_without_losing_or_duplicating() {
        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        let backend = Arc::new(FlakyRecognizer {
            calls: AtomicUsize::new(0),
        });
        let mut bridge =
            StreamingBridge::open("s2", backend.clone(), fast_config(), audio_rx).unwrap();

        for word in ["one", "two", "three", "four"] {
            audio_tx.send(AudioFrame::Chunk(word.as_bytes().to_vec())).unwrap();
        }
        audio_tx.send(AudioFrame::EndOfStream).unwrap();

        let texts: Vec<String> = drain(&mut bridge).await.into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["one", "two", "three", "four"]);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_chunks_are_not_sent() {
        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        let backend = Arc::new(FlakyRecognizer {
            calls: AtomicUsize::new(1),
        });
        let mut bridge = StreamingBridge::open("s3", backend, fast_config(), audio_rx).unwrap();

        audio_tx.send(AudioFrame::Chunk(Vec::new())).unwrap();
        audio_tx.send(AudioFrame::Chunk(b"hello".to_vec())).unwrap();
        drop(audio_tx);

        let events = drain(&mut bridge).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text, "hello");
    }

    #[tokio::test]
    async fn test_fatal_error_emits_single_error_event() {
        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        let mut bridge =
            StreamingBridge::open("s4", Arc::new(BrokenRecognizer), fast_config(), audio_rx)
                .unwrap();
        audio_tx.send(AudioFrame::Chunk(vec![0u8; 4])).unwrap();

        // audio_tx stays open: the bridge must still finish
        let events = drain(&mut bridge).await;
        assert_eq!(events.len(), 1);
        assert!(events[0].error && events[0].is_final);
        assert!(events[0].text.contains("invalid credentials"));
        drop(audio_tx);
    }
}
