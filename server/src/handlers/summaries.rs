//! Results of finished jobs.
//!
//! A failed job is a normal terminal state, so it is answered with 200 and
//! the error payload rather than a 5xx.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use layscience::job::{JobError, JobId, JobResult, JobState};
use layscience::{ResultError, Translation};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub id: JobId,
    pub state: JobState,
    #[serde(flatten)]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

pub async fn get_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let id = JobId::from(id);
    let response = match state.status().get_result(&id) {
        Ok(result) => SummaryResponse {
            id,
            state: JobState::Done,
            result: Some(result),
            error: None,
        },
        Err(ResultError::Failed(error)) => SummaryResponse {
            id,
            state: JobState::Failed,
            result: None,
            error: Some(error),
        },
        Err(other) => return Err(other.into()),
    };
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub target_language: String,
}

/// Translates the summary of a `done` job; 409 for any other state.
pub async fn translate_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TranslateRequest>, JsonRejection>,
) -> Result<Json<Translation>, ApiError> {
    let Json(request) = payload?;
    let translation = state
        .translator()
        .translate(&JobId::from(id), &request.target_language)
        .await?;
    Ok(Json(translation))
}
