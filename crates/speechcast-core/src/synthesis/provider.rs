//! Speech provider abstraction
//!
//! A provider is opaque to the pipeline beyond three steps: acquire a
//! [`Synthesizer`] for a [`SpeechConfig`], start speaking once (a future
//! resolving when synthesis has begun), then read audio from the returned
//! [`AudioReader`] until it reports end-of-stream.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio::io::AsyncRead;

use crate::error::{Error, Result};

/// Provider audio-data stream. A read of zero bytes is end-of-stream.
pub type AudioReader = Pin<Box<dyn AsyncRead + Send>>;

/// Outstanding "start speaking" operation; resolves once synthesis has begun.
pub type SpeakTask = BoxFuture<'static, Result<AudioReader>>;

/// Audio encoding requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Headerless 16 kHz 16-bit mono PCM
    #[default]
    #[serde(rename = "raw-16khz-16bit-mono-pcm")]
    Raw16Khz16BitMonoPcm,
    /// 16 kHz 16-bit mono PCM inside a RIFF container
    #[serde(rename = "riff-16khz-16bit-mono-pcm")]
    Riff16Khz16BitMonoPcm,
}

impl OutputFormat {
    /// Value of the provider's output-format header
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Raw16Khz16BitMonoPcm => "raw-16khz-16bit-mono-pcm",
            OutputFormat::Riff16Khz16BitMonoPcm => "riff-16khz-16bit-mono-pcm",
        }
    }

    pub fn has_header(&self) -> bool {
        matches!(self, OutputFormat::Riff16Khz16BitMonoPcm)
    }
}

/// Subscription, region and voice for one synthesis request
#[derive(Clone)]
pub struct SpeechConfig {
    subscription_key: String,
    region: String,
    voice_name: Option<String>,
    output_format: OutputFormat,
}

impl std::fmt::Debug for SpeechConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechConfig")
            .field("subscription_key", &"<redacted>")
            .field("region", &self.region)
            .field("voice_name", &self.voice_name)
            .field("output_format", &self.output_format)
            .finish()
    }
}

impl SpeechConfig {
    pub fn from_subscription(key: impl Into<String>, region: impl Into<String>) -> Result<Self> {
        let subscription_key = key.into();
        let region = region.into();
        if subscription_key.trim().is_empty() {
            return Err(Error::ConfigError("speech key is empty".to_string()));
        }
        if region.trim().is_empty() {
            return Err(Error::ConfigError("speech region is empty".to_string()));
        }
        Ok(Self {
            subscription_key,
            region,
            voice_name: None,
            output_format: OutputFormat::default(),
        })
    }

    pub fn set_voice_name(&mut self, voice: impl Into<String>) -> Result<()> {
        let voice = voice.into();
        if voice.trim().is_empty() {
            return Err(Error::ConfigError("voice name is empty".to_string()));
        }
        self.voice_name = Some(voice);
        Ok(())
    }

    pub fn set_output_format(&mut self, format: OutputFormat) {
        self.output_format = format;
    }

    pub fn subscription_key(&self) -> &str {
        &self.subscription_key
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn voice_name(&self) -> Option<&str> {
        self.voice_name.as_deref()
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }
}

/// Source of synthesizers, shared across requests
pub trait SpeechBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Acquire a synthesizer bound to `config`.
    fn synthesizer(&self, config: &SpeechConfig) -> Result<Box<dyn Synthesizer>>;
}

/// One provider synthesizer instance, owned by a single request
pub trait Synthesizer: Send {
    /// Issue the provider's start-speaking call for `text`.
    fn start_speaking(&mut self, text: &str) -> SpeakTask;
}
