//! Application state management

use speechcast_core::audio::Transcoder;
use speechcast_core::{HubHandle, ServerConfig, SpeechBackend, SynthesisBridge};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub backend: Arc<dyn SpeechBackend>,
    pub config: Arc<ServerConfig>,
    pub transcoder: Arc<Transcoder>,
}

impl AppState {
    pub fn new(hub: HubHandle, backend: Arc<dyn SpeechBackend>, config: ServerConfig) -> Self {
        let transcoder = Transcoder::new(&config.ffmpeg_path);
        Self {
            hub,
            backend,
            config: Arc::new(config),
            transcoder: Arc::new(transcoder),
        }
    }

    /// Bridge bound to the caller's provider credentials
    pub fn bridge(&self, speech_key: &str, speech_region: &str) -> SynthesisBridge {
        SynthesisBridge::new(self.backend.clone())
            .with_subscription(speech_key, speech_region)
            .with_config(self.config.synthesis.clone())
    }
}
