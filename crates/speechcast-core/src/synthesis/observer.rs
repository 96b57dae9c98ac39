//! Synthesis lifecycle hooks

use tracing::{debug, info, warn};

/// Hooks invoked by the synthesis worker. All methods default to no-ops;
/// nothing in the pipeline depends on them.
pub trait SynthesisObserver: Send + Sync {
    fn on_started(&self, _voice: &str) {}

    fn on_synthesizing(&self, _chunk_len: usize) {}

    fn on_completed(&self, _total_bytes: usize) {}

    fn on_canceled(&self, _reason: &str) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SynthesisObserver for NoopObserver {}

/// Observer that logs lifecycle events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SynthesisObserver for TracingObserver {
    fn on_started(&self, voice: &str) {
        info!("Synthesis started ({})", voice);
    }

    fn on_synthesizing(&self, chunk_len: usize) {
        debug!("Synthesizing, audio chunk size {}", chunk_len);
    }

    fn on_completed(&self, total_bytes: usize) {
        info!("Synthesized, audio length {}", total_bytes);
    }

    fn on_canceled(&self, reason: &str) {
        warn!("Synthesis canceled: {}", reason);
    }
}
