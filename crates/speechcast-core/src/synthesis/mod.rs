//! Text-to-speech synthesis
//!
//! [`SpeechBackend`] is the seam between the pipeline and a provider;
//! [`SynthesisBridge`] turns one provider operation into a stream of
//! [`AudioChunk`]s.

pub mod azure;
mod bridge;
#[cfg(test)]
pub(crate) mod mock;
mod observer;
mod provider;

pub use azure::AzureBackend;
pub use bridge::{
    AudioChunk, ChunkReceiver, SynthesisBridge, SynthesisProducer, SynthesisSession,
};
pub use observer::{NoopObserver, SynthesisObserver, TracingObserver};
pub use provider::{
    AudioReader, OutputFormat, SpeakTask, SpeechBackend, SpeechConfig, Synthesizer,
};
