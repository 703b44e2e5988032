use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use super::{api_error, ApiError};
use crate::state::AppState;

/// `GET /`: liveness plus a store round trip.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Rows in the voter table.
    pub voters: i64,
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let voters = state
        .storage
        .count_voters()
        .await
        .map_err(|e| api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;

    Ok(Json(HealthResponse {
        status: "ok",
        voters,
    }))
}
