//! Blocking synthesis endpoint
//!
//! Synthesizes the whole text, then writes `<unix-seconds>.<ext>` into the
//! configured output directory.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use speechcast_core::audio::{strip_header, write_wav_file, TargetFormat};
use std::path::PathBuf;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Body shared by the blocking and streaming endpoints
#[derive(Deserialize)]
pub struct TtsRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub speech_key: String,
    #[serde(default)]
    pub speech_region: String,
    #[serde(default)]
    pub voice_name: String,
    #[serde(default)]
    pub format: TargetFormat,
}

pub async fn synthesize(
    State(state): State<AppState>,
    payload: Result<Json<TtsRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;

    let audio = state
        .bridge(&request.speech_key, &request.speech_region)
        .synthesize(&request.text, &request.voice_name)
        .await?;
    let pcm = strip_header(&audio);

    let path = output_path(&state, request.format);
    match request.format {
        TargetFormat::Wav => write_wav_file(&path, pcm).await?,
        TargetFormat::Mp3 => {
            let encoded = state.transcoder.pcm_to_mp3(pcm).await?;
            tokio::fs::write(&path, encoded)
                .await
                .map_err(speechcast_core::Error::from)?;
        }
    }

    info!(
        "Saved {} bytes of synthesized audio to {}",
        pcm.len(),
        path.display()
    );
    Ok(Json(json!({})))
}

fn output_path(state: &AppState, format: TargetFormat) -> PathBuf {
    let stamp = chrono::Utc::now().timestamp();
    state
        .config
        .output_dir
        .join(format!("{}.{}", stamp, format.extension()))
}
