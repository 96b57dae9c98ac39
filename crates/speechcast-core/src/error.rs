//! Error types for the speechcast pipeline

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("text is empty")]
    EmptyText,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("tts timeout after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Audio stream read failed: {0}")]
    StreamReadError(String),

    #[error("Synthesis cancelled")]
    Cancelled,

    #[error("Broadcast hub is not running")]
    HubUnavailable,

    #[error("Transcode error: {0}")]
    TranscodeError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl Error {
    /// Whether the error was caused by the caller's input rather than the
    /// provider or the host.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Error::EmptyText | Error::ConfigError(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
