//! Liveness endpoint

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub clients: usize,
}

pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let clients = state.hub.client_count().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        clients,
    }))
}
