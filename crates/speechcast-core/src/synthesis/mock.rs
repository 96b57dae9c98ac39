//! Scripted speech backend for tests

use futures::FutureExt;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::provider::{AudioReader, SpeakTask, SpeechBackend, SpeechConfig, Synthesizer};
use crate::error::{Error, Result};

#[derive(Clone)]
pub(crate) enum Behavior {
    Audio(Vec<u8>),
    ProviderFails(String),
    Hang,
    ReadFails(Vec<u8>),
}

pub(crate) struct MockBackend {
    behavior: Behavior,
    pub(crate) acquired: Arc<AtomicUsize>,
    pub(crate) released: Arc<AtomicUsize>,
}

impl MockBackend {
    pub(crate) fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            acquired: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        })
    }
}

impl SpeechBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn synthesizer(&self, _config: &SpeechConfig) -> Result<Box<dyn Synthesizer>> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSynthesizer {
            behavior: self.behavior.clone(),
            released: self.released.clone(),
        }))
    }
}

struct MockSynthesizer {
    behavior: Behavior,
    released: Arc<AtomicUsize>,
}

impl Drop for MockSynthesizer {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl Synthesizer for MockSynthesizer {
    fn start_speaking(&mut self, _text: &str) -> SpeakTask {
        match self.behavior.clone() {
            Behavior::Audio(audio) => async move {
                Ok::<_, Error>(Box::pin(io::Cursor::new(audio)) as AudioReader)
            }
            .boxed(),
            Behavior::ProviderFails(message) => {
                async move { Err::<AudioReader, _>(Error::ProviderError(message)) }.boxed()
            }
            Behavior::Hang => futures::future::pending::<Result<AudioReader>>().boxed(),
            Behavior::ReadFails(prefix) => async move {
                let reader = tokio_test::io::Builder::new()
                    .read(&prefix)
                    .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
                    .build();
                Ok::<_, Error>(Box::pin(reader) as AudioReader)
            }
            .boxed(),
        }
    }
}
