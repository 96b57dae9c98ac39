//! Synthesis bridge: one provider "start speaking" operation per request,
//! exposed as a pull-based channel of audio chunks.
//!
//! Lifecycle of a streamed request:
//! 1. [`SynthesisBridge::start_stream`] validates input, acquires a
//!    synthesizer and issues the start call.
//! 2. [`SynthesisProducer::session`] turns it into a [`SynthesisSession`].
//! 3. [`SynthesisSession::start`] spawns the worker and returns the chunk
//!    receiver. The worker waits for the begin outcome under the handshake
//!    timeout, then relays audio until end-of-stream, an error, cancellation,
//!    or the receiver going away.

use bytes::Bytes;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::observer::{SynthesisObserver, TracingObserver};
use super::provider::{SpeakTask, SpeechBackend, SpeechConfig, Synthesizer};
use crate::config::SynthesisConfig;
use crate::error::{Error, Result};

/// Capacity of the chunk channel. One slot keeps the worker in lockstep with
/// the consumer so audio never piles up in memory.
const CHUNK_CHANNEL_CAPACITY: usize = 1;

/// One item of a synthesis stream
#[derive(Debug)]
pub enum AudioChunk {
    Data(Bytes),
    EndOfStream,
    Error(Error),
}

impl AudioChunk {
    /// Whether this item closes the stream
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AudioChunk::Data(_))
    }
}

pub type ChunkReceiver = mpsc::Receiver<AudioChunk>;

/// Entry point for starting synthesis against a backend
pub struct SynthesisBridge {
    backend: Arc<dyn SpeechBackend>,
    subscription_key: String,
    region: String,
    config: SynthesisConfig,
    observer: Arc<dyn SynthesisObserver>,
}

impl SynthesisBridge {
    pub fn new(backend: Arc<dyn SpeechBackend>) -> Self {
        Self {
            backend,
            subscription_key: String::new(),
            region: String::new(),
            config: SynthesisConfig::default(),
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_subscription(mut self, key: impl Into<String>, region: impl Into<String>) -> Self {
        self.subscription_key = key.into();
        self.region = region.into();
        self
    }

    pub fn with_config(mut self, config: SynthesisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SynthesisObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Start synthesizing `text` with `voice`.
    ///
    /// Empty text is rejected before any provider resource is acquired.
    pub fn start_stream(&self, text: &str, voice: &str) -> Result<SynthesisProducer> {
        if text.trim().is_empty() {
            return Err(Error::EmptyText);
        }

        let mut synthesizer = self.acquire(voice).map_err(|e| {
            error!("{} synthesizer setup failed: {}", self.backend.name(), e);
            e
        })?;
        let task = synthesizer.start_speaking(text);
        info!(
            "Started {} synthesis: {} chars, voice {}",
            self.backend.name(),
            text.chars().count(),
            voice
        );

        Ok(SynthesisProducer {
            synthesizer,
            task,
            voice: voice.to_string(),
            config: self.config.clone(),
            observer: self.observer.clone(),
        })
    }

    /// Synthesize `text` to completion and return the audio bytes.
    pub async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        let mut chunks = self.start_stream(text, voice)?.session().start();
        let mut audio = Vec::new();
        while let Some(chunk) = chunks.recv().await {
            match chunk {
                AudioChunk::Data(data) => audio.extend_from_slice(&data),
                AudioChunk::EndOfStream => return Ok(audio),
                AudioChunk::Error(e) => return Err(e),
            }
        }
        // The worker only exits without a terminal item when cancelled.
        Err(Error::Cancelled)
    }

    fn acquire(&self, voice: &str) -> Result<Box<dyn Synthesizer>> {
        let mut speech_config =
            SpeechConfig::from_subscription(self.subscription_key.as_str(), self.region.as_str())?;
        speech_config.set_voice_name(voice)?;
        speech_config.set_output_format(self.config.output_format);
        self.backend.synthesizer(&speech_config)
    }
}

/// A started provider operation, not yet being read
pub struct SynthesisProducer {
    synthesizer: Box<dyn Synthesizer>,
    task: SpeakTask,
    voice: String,
    config: SynthesisConfig,
    observer: Arc<dyn SynthesisObserver>,
}

impl std::fmt::Debug for SynthesisProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisProducer")
            .field("voice", &self.voice)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SynthesisProducer {
    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub fn session(self) -> SynthesisSession {
        SynthesisSession {
            producer: self,
            cancel: CancellationToken::new(),
        }
    }
}

/// Per-request synthesis session
pub struct SynthesisSession {
    producer: SynthesisProducer,
    cancel: CancellationToken,
}

impl SynthesisSession {
    /// Abort the worker when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn the worker and return the receiving end of the chunk stream.
    pub fn start(self) -> ChunkReceiver {
        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        tokio::spawn(self.run(tx));
        rx
    }

    async fn run(self, tx: mpsc::Sender<AudioChunk>) {
        let SynthesisSession { producer, cancel } = self;
        let SynthesisProducer {
            synthesizer,
            task,
            voice,
            config,
            observer,
        } = producer;
        // Held until the worker exits so the provider instance outlives its stream.
        let _synthesizer = synthesizer;
        let timeout = config.handshake_timeout();

        let begun = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                observer.on_canceled("cancelled before synthesis began");
                return;
            }
            outcome = tokio::time::timeout(timeout, task) => outcome,
        };

        let mut reader = match begun {
            Err(_) => {
                error!("tts timeout");
                observer.on_canceled("timeout");
                emit(&tx, &cancel, AudioChunk::Error(Error::Timeout(timeout))).await;
                return;
            }
            Ok(Err(e)) => {
                error!("Stream tts got an error: {}", e);
                observer.on_canceled(&e.to_string());
                emit(&tx, &cancel, AudioChunk::Error(e)).await;
                return;
            }
            Ok(Ok(reader)) => reader,
        };
        observer.on_started(&voice);

        let mut buf = vec![0u8; config.read_chunk_size.max(1)];
        let mut total = 0usize;
        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    observer.on_canceled("cancelled");
                    return;
                }
                read = reader.read(&mut buf) => read,
            };

            match read {
                Ok(0) => {
                    observer.on_completed(total);
                    emit(&tx, &cancel, AudioChunk::EndOfStream).await;
                    return;
                }
                Ok(n) => {
                    total += n;
                    observer.on_synthesizing(n);
                    let chunk = AudioChunk::Data(Bytes::copy_from_slice(&buf[..n]));
                    if !emit(&tx, &cancel, chunk).await {
                        debug!("Chunk consumer gone after {} bytes", total);
                        observer.on_canceled("consumer gone");
                        return;
                    }
                }
                Err(e) => {
                    error!("Audio stream read failed after {} bytes: {}", total, e);
                    emit(
                        &tx,
                        &cancel,
                        AudioChunk::Error(Error::StreamReadError(e.to_string())),
                    )
                    .await;
                    return;
                }
            }
        }
    }
}

/// Hand `chunk` to the consumer. Returns false if the consumer is gone or
/// the session was cancelled while waiting.
async fn emit(tx: &mpsc::Sender<AudioChunk>, cancel: &CancellationToken, chunk: AudioChunk) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(chunk) => sent.is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::mock::{Behavior, MockBackend};
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingObserver {
        events: Mutex<Vec<String>>,
    }

    impl SynthesisObserver for CountingObserver {
        fn on_started(&self, voice: &str) {
            self.events.lock().unwrap().push(format!("started:{voice}"));
        }

        fn on_synthesizing(&self, chunk_len: usize) {
            self.events.lock().unwrap().push(format!("chunk:{chunk_len}"));
        }

        fn on_completed(&self, total_bytes: usize) {
            self.events.lock().unwrap().push(format!("completed:{total_bytes}"));
        }

        fn on_canceled(&self, reason: &str) {
            self.events.lock().unwrap().push(format!("canceled:{reason}"));
        }
    }

    fn bridge(backend: Arc<MockBackend>) -> SynthesisBridge {
        SynthesisBridge::new(backend).with_subscription("key", "westus")
    }

    async fn collect(mut rx: ChunkReceiver) -> Vec<AudioChunk> {
        let mut items = Vec::new();
        while let Some(chunk) = rx.recv().await {
            items.push(chunk);
        }
        items
    }

    #[tokio::test]
    async fn test_empty_text_acquires_nothing() {
        let backend = MockBackend::new(Behavior::Audio(vec![1, 2, 3]));
        let err = bridge(backend.clone()).start_stream("", "en-US-JennyNeural").unwrap_err();
        assert!(matches!(err, Error::EmptyText));
        assert!(matches!(
            bridge(backend.clone()).start_stream("   ", "en-US-JennyNeural"),
            Err(Error::EmptyText)
        ));
        assert_eq!(backend.acquired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_backend() {
        let backend = MockBackend::new(Behavior::Audio(vec![1]));
        let err = SynthesisBridge::new(backend.clone())
            .start_stream("hello", "en-US-JennyNeural")
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));

        let err = bridge(backend.clone()).start_stream("hello", "").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        assert_eq!(backend.acquired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chunks_arrive_in_order_then_end() {
        let audio: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();
        let backend = MockBackend::new(Behavior::Audio(audio.clone()));
        let producer = bridge(backend.clone())
            .start_stream("hello", "en-US-JennyNeural")
            .unwrap();

        let items = collect(producer.session().start()).await;

        let sizes: Vec<usize> = items
            .iter()
            .filter_map(|c| match c {
                AudioChunk::Data(d) => Some(d.len()),
                _ => None,
            })
            .collect();
        assert_eq!(sizes, vec![2048, 2048, 904]);
        assert!(matches!(items.last(), Some(AudioChunk::EndOfStream)));
        assert_eq!(items.iter().filter(|c| c.is_terminal()).count(), 1);

        let joined: Vec<u8> = items
            .iter()
            .filter_map(|c| match c {
                AudioChunk::Data(d) => Some(d.to_vec()),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(joined, audio);
        assert_eq!(backend.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_read_chunk_size_is_configurable() {
        let backend = MockBackend::new(Behavior::Audio(vec![0u8; 1000]));
        let config = SynthesisConfig {
            read_chunk_size: 256,
            ..Default::default()
        };
        let items = collect(
            bridge(backend)
                .with_config(config)
                .start_stream("hello", "en-US-JennyNeural")
                .unwrap()
                .session()
                .start(),
        )
        .await;
        assert_eq!(items.len(), 5);
        assert!(matches!(items[3], AudioChunk::Data(ref d) if d.len() == 232));
    }

    #[tokio::test]
    async fn test_provider_error_is_single_terminal_chunk() {
        let backend = MockBackend::new(Behavior::ProviderFails("bad voice".to_string()));
        let items = collect(
            bridge(backend.clone())
                .start_stream("hello", "xx-XX-Nobody")
                .unwrap()
                .session()
                .start(),
        )
        .await;

        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], AudioChunk::Error(Error::ProviderError(m)) if m == "bad voice"));
        assert_eq!(backend.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_timeout_yields_single_error() {
        let backend = MockBackend::new(Behavior::Hang);
        let items = collect(
            bridge(backend.clone())
                .start_stream("hello", "en-US-JennyNeural")
                .unwrap()
                .session()
                .start(),
        )
        .await;

        assert_eq!(items.len(), 1);
        match &items[0] {
            AudioChunk::Error(e @ Error::Timeout(d)) => {
                assert_eq!(*d, Duration::from_secs(60));
                assert!(e.to_string().contains("tts timeout"));
            }
            other => panic!("unexpected chunk: {other:?}"),
        }
        assert_eq!(backend.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_read_error_is_distinct_from_end_of_stream() {
        let backend = MockBackend::new(Behavior::ReadFails(vec![5u8; 100]));
        let items = collect(
            bridge(backend)
                .start_stream("hello", "en-US-JennyNeural")
                .unwrap()
                .session()
                .start(),
        )
        .await;

        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], AudioChunk::Data(d) if d.len() == 100));
        assert!(matches!(&items[1], AudioChunk::Error(Error::StreamReadError(_))));
    }

    #[tokio::test]
    async fn test_cancellation_releases_provider() {
        let backend = MockBackend::new(Behavior::Hang);
        let cancel = CancellationToken::new();
        let mut rx = bridge(backend.clone())
            .start_stream("hello", "en-US-JennyNeural")
            .unwrap()
            .session()
            .with_cancellation(cancel.clone())
            .start();

        cancel.cancel();
        assert!(rx.recv().await.is_none());
        assert_eq!(backend.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropped_receiver_stops_worker() {
        let backend = MockBackend::new(Behavior::Audio(vec![0u8; 1 << 20]));
        let mut rx = bridge(backend.clone())
            .start_stream("hello", "en-US-JennyNeural")
            .unwrap()
            .session()
            .start();

        assert!(matches!(rx.recv().await, Some(AudioChunk::Data(_))));
        drop(rx);

        tokio::time::timeout(Duration::from_secs(5), async {
            while backend.released.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("worker should release the synthesizer");
    }

    #[tokio::test]
    async fn test_observer_hooks() {
        let backend = MockBackend::new(Behavior::Audio(vec![0u8; 3000]));
        let observer = Arc::new(CountingObserver::default());
        let items = collect(
            bridge(backend)
                .with_observer(observer.clone())
                .start_stream("hello", "en-US-JennyNeural")
                .unwrap()
                .session()
                .start(),
        )
        .await;
        assert_eq!(items.len(), 3);

        let events = observer.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "started:en-US-JennyNeural",
                "chunk:2048",
                "chunk:952",
                "completed:3000"
            ]
        );
    }

    #[tokio::test]
    async fn test_synthesize_collects_audio() {
        let audio = vec![42u8; 4100];
        let backend = MockBackend::new(Behavior::Audio(audio.clone()));
        let out = bridge(backend).synthesize("hello", "en-US-JennyNeural").await.unwrap();
        assert_eq!(out, audio);
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthesize_surfaces_timeout() {
        let backend = MockBackend::new(Behavior::Hang);
        let err = bridge(backend)
            .synthesize("hello", "en-US-JennyNeural")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_synthesize_surfaces_provider_error() {
        let backend = MockBackend::new(Behavior::ProviderFails("quota".to_string()));
        let err = bridge(backend)
            .synthesize("hello", "en-US-JennyNeural")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProviderError(_)));
    }
}
