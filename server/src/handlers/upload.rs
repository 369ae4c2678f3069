//! PDF upload.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

use layscience::job::UploadId;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_id: UploadId,
}

/// Stores the raw request body as a PDF and returns its file id.
pub async fn upload(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    let file_id = state.uploads().save(&body).await?;
    Ok(Json(UploadResponse { file_id }))
}
