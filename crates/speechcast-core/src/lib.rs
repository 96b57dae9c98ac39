//! Speechcast Core - Streaming Text-to-Speech Pipeline
//!
//! This crate turns a cloud speech provider's "start speaking" operation into
//! an ordered stream of audio chunks and multiplexes it with server-wide
//! broadcast messages for streaming HTTP clients.
//!
//! # Architecture
//!
//! - [`synthesis`]: provider abstraction, the Azure REST backend, and the
//!   bridge that reads provider audio into a bounded chunk channel
//! - [`broadcast`]: the hub actor owning the client registry, the periodic
//!   clock publisher, and the per-request stream session adapter
//! - [`audio`]: WAV framing and external transcoding
//!
//! # Example
//!
//! ```ignore
//! use speechcast_core::{AzureBackend, Hub, StreamSession, SynthesisBridge};
//!
//! let hub = Hub::spawn();
//! let bridge = SynthesisBridge::new(Arc::new(AzureBackend::new()?))
//!     .with_subscription(key, region);
//! let session = StreamSession::open(&hub, bridge.start_stream("Hello", voice)).await?;
//! let events = session.into_events();
//! ```

pub mod audio;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod synthesis;

pub use broadcast::{Hub, HubHandle, SessionEvent, StreamSession};
pub use config::{ServerConfig, SynthesisConfig};
pub use error::{Error, Result};
pub use synthesis::{AudioChunk, AzureBackend, OutputFormat, SpeechBackend, SynthesisBridge};
