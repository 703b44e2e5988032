mod health;
mod upload;
mod voters;

use axum::{extract::DefaultBodyLimit, http::StatusCode, Json, Router};
use serde::Serialize;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::state::AppState;

/// Routes relative to `/api`, without middleware.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(upload::router())
        .nest("/voters", voters::router())
        .nest("/health", health::router())
}

/// The full application: API routes under `/api` with the HTTP layers.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes();

    Router::new()
        .nest("/api", router())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            detail: detail.into(),
        }),
    )
}
