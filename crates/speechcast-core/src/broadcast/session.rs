//! Stream session adapter
//!
//! Joins one client's broadcast channel and one synthesis chunk stream into
//! a single event stream for the transport. Dropping the stream, whether
//! after the terminal event or because the transport went away, deregisters
//! the client and cancels synthesis.

use bytes::Bytes;
use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::hub::{ClientChannel, ClientId, HubHandle};
use crate::error::{Error, Result};
use crate::synthesis::{AudioChunk, ChunkReceiver, SynthesisProducer};

/// Payload of the terminal audio event on normal completion
pub const END_OF_STREAM_MARKER: &str = "EOF";

/// One event delivered to a streaming client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Broadcast text from the hub
    Message(String),
    /// Raw audio chunk
    Audio(Bytes),
    /// Synthesis finished normally
    End,
    /// Synthesis failed; the reason is safe to show to the client
    Failed(String),
}

impl SessionEvent {
    /// Transport-level event name
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Message(_) => "message",
            SessionEvent::Audio(_) | SessionEvent::End => "byte",
            SessionEvent::Failed(_) => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::End | SessionEvent::Failed(_))
    }
}

enum Source {
    Chunks(ChunkReceiver),
    Failed(Error),
}

/// Deregisters the client and cancels synthesis when dropped.
struct ClientGuard {
    hub: HubHandle,
    channel: ClientChannel,
    cancel: CancellationToken,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.hub.deregister(self.channel.id());
        debug!("Stream session for client {} closed", self.channel.id());
    }
}

/// A registered client with its synthesis attached
pub struct StreamSession {
    guard: ClientGuard,
    source: Source,
}

impl StreamSession {
    /// Register a client with `hub` and start relaying `synthesis`.
    ///
    /// A start-up error is kept and reported as the session's only event.
    pub async fn open(hub: &HubHandle, synthesis: Result<SynthesisProducer>) -> Result<Self> {
        let channel = hub.register().await?;
        let cancel = CancellationToken::new();

        let source = match synthesis {
            Ok(producer) => Source::Chunks(
                producer
                    .session()
                    .with_cancellation(cancel.clone())
                    .start(),
            ),
            Err(e) => Source::Failed(e),
        };

        Ok(Self {
            guard: ClientGuard {
                hub: hub.clone(),
                channel,
                cancel,
            },
            source,
        })
    }

    pub fn client_id(&self) -> ClientId {
        self.guard.channel.id()
    }

    /// Consume the session as a stream of events ending with exactly one
    /// [`SessionEvent::End`] or [`SessionEvent::Failed`].
    pub fn into_events(self) -> impl Stream<Item = SessionEvent> + Send + 'static {
        let StreamSession { mut guard, source } = self;

        async_stream::stream! {
            let mut chunks = match source {
                Source::Chunks(chunks) => chunks,
                Source::Failed(e) => {
                    warn!("Stream tts got an error: {}", e);
                    yield SessionEvent::Failed(e.to_string());
                    return;
                }
            };

            let mut broadcasts_open = true;
            loop {
                let event = tokio::select! {
                    message = guard.channel.recv(), if broadcasts_open => match message {
                        Some(text) => Some(SessionEvent::Message(text)),
                        None => {
                            broadcasts_open = false;
                            None
                        }
                    },
                    chunk = chunks.recv() => Some(chunk_event(chunk)),
                };

                if let Some(event) = event {
                    let terminal = event.is_terminal();
                    yield event;
                    if terminal {
                        break;
                    }
                }
            }
        }
    }
}

fn chunk_event(chunk: Option<AudioChunk>) -> SessionEvent {
    match chunk {
        Some(AudioChunk::Data(data)) => SessionEvent::Audio(data),
        Some(AudioChunk::EndOfStream) => {
            info!("Stream session finished");
            SessionEvent::End
        }
        Some(AudioChunk::Error(e)) => {
            warn!("Stream session failed: {}", e);
            SessionEvent::Failed(e.to_string())
        }
        None => SessionEvent::Failed(Error::Cancelled.to_string()),
    }
}
