//! Configuration types for the speechcast pipeline and server

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::synthesis::OutputFormat;

/// Synthesis bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// How long to wait for the provider to begin synthesis
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,

    /// Maximum bytes read from the provider audio stream per chunk
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,

    /// Audio format requested from the provider
    #[serde(default)]
    pub output_format: OutputFormat,
}

impl SynthesisConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: default_handshake_timeout_secs(),
            read_chunk_size: default_read_chunk_size(),
            output_format: OutputFormat::default(),
        }
    }
}

fn default_handshake_timeout_secs() -> u64 {
    60
}

fn default_read_chunk_size() -> usize {
    2048
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory the blocking endpoint writes audio files into
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Interval of the clock broadcast sent to streaming clients
    #[serde(default = "default_broadcast_interval_secs")]
    pub broadcast_interval_secs: u64,

    /// Grace period for in-flight requests on shutdown
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    #[serde(default = "default_cors_enabled")]
    pub cors_enabled: bool,

    /// ffmpeg executable used for MP3 output
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_secs(self.broadcast_interval_secs.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            output_dir: default_output_dir(),
            broadcast_interval_secs: default_broadcast_interval_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            cors_enabled: default_cors_enabled(),
            ffmpeg_path: default_ffmpeg_path(),
            synthesis: SynthesisConfig::default(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_broadcast_interval_secs() -> u64 {
    10
}

fn default_shutdown_grace_secs() -> u64 {
    2
}

fn default_cors_enabled() -> bool {
    true
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}
