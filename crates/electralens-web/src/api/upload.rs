use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use electralens_core::{ImportSummary, IngestError};
use serde::Serialize;

use super::{api_error, ApiError};
use crate::state::AppState;

const UPLOAD_FIELD: &str = "file";

/// `POST /upload_pdf`: multipart upload of one roll under the `file` field.
pub fn router() -> Router<AppState> {
    Router::new().route("/upload_pdf", post(upload_pdf))
}

/// Body returned for every document that could be read.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub uploaded: bool,
    pub summary: ImportSummary,
    /// `"no data found"` when no table rows were extracted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 400 for documents that cannot be read, 500 for everything else.
fn ingest_error(e: &IngestError) -> ApiError {
    let status = if e.is_input_failure() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    api_error(status, format!("PDF processing failed: {e}"))
}

async fn upload_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(e.status(), e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| api_error(e.status(), e.body_text()))?;

        tracing::info!("Received {} ({} bytes)", file_name, data.len());

        let report = state
            .pipeline
            .ingest_bytes(&data, &file_name, state.storage.as_ref())
            .await
            .map_err(|e| {
                tracing::warn!("Import of {} failed: {}", file_name, e);
                ingest_error(&e)
            })?;

        let message = report.is_no_data().then(|| "no data found".to_string());

        return Ok(Json(UploadResponse {
            uploaded: true,
            summary: report.summary,
            message,
        }));
    }

    Err(api_error(
        StatusCode::BAD_REQUEST,
        format!("Missing multipart field '{UPLOAD_FIELD}'"),
    ))
}
