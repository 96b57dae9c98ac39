//! Streaming synthesis endpoint (server-sent events)
//!
//! Event names:
//! - `message`: broadcast text from the hub
//! - `byte`: base64 audio chunk, or `EOF` once synthesis has finished
//! - `error`: terminal failure reason

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use base64::Engine;
use futures::StreamExt;
use speechcast_core::broadcast::END_OF_STREAM_MARKER;
use speechcast_core::{SessionEvent, StreamSession};
use std::convert::Infallible;
use tracing::info;

use super::tts::TtsRequest;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn synthesize_stream(
    State(state): State<AppState>,
    payload: Result<Json<TtsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;

    let synthesis = state
        .bridge(&request.speech_key, &request.speech_region)
        .start_stream(&request.text, &request.voice_name);
    let session = StreamSession::open(&state.hub, synthesis).await?;
    info!("Streaming client {} connected", session.client_id());

    let stream = session
        .into_events()
        .map(|event| Ok::<_, Infallible>(format_event(&event)));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::internal(format!("Failed to build event stream: {}", e)))
}

/// Render one event as an SSE frame.
pub(crate) fn format_event(event: &SessionEvent) -> String {
    let data = match event {
        SessionEvent::Message(text) => text.clone(),
        SessionEvent::Audio(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
        SessionEvent::End => END_OF_STREAM_MARKER.to_string(),
        SessionEvent::Failed(reason) => reason.clone(),
    };

    let mut frame = format!("event: {}\n", event.name());
    // Multi-line payloads need one data field per line.
    for line in data.split('\n') {
        frame.push_str("data: ");
        frame.push_str(line.trim_end_matches('\r'));
        frame.push('\n');
    }
    frame.push('\n');
    frame
}
