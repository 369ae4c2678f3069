//! Job submission, listing and status polling.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use layscience::job::{JobId, JobInput, JobOptions, JobState};
use layscience::store::DEFAULT_LIST_LIMIT;
use layscience::JobStatus;

use crate::error::ApiError;
use crate::state::AppState;

/// Upper bound for `?limit=`.
const MAX_LIST_LIMIT: u32 = 500;

/// Exactly one field must be set.
#[derive(Debug, Default, Deserialize)]
pub struct InputRequest {
    pub doi: Option<String>,
    pub url: Option<String>,
    pub file_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub input: InputRequest,
    #[serde(default)]
    pub options: JobOptions,
}

#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub id: JobId,
    pub state: JobState,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub state: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobStatus>,
}

/// Validates the request, creates a `queued` job and returns at once.
pub async fn create_job(
    State(state): State<AppState>,
    payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateJobResponse>), ApiError> {
    let Json(request) = payload?;
    let input = JobInput::from_parts(
        request.input.doi.as_deref(),
        request.input.url.as_deref(),
        request.input.file_id.as_deref(),
    )?;
    let options = request.options.validated()?;

    let job = state.orchestrator().submit(input, options).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(CreateJobResponse {
            id: job.id,
            state: job.state,
        }),
    ))
}

/// Lists jobs, oldest first. Without `state`, all states are included.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<JobListResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);

    let jobs = match query.state.as_deref() {
        Some(raw) => {
            let job_state: JobState = raw.parse()?;
            state.status().list(job_state, limit)?
        }
        None => {
            let mut jobs = Vec::new();
            for job_state in [
                JobState::Queued,
                JobState::Running,
                JobState::Done,
                JobState::Failed,
            ] {
                jobs.extend(state.status().list(job_state, limit)?);
            }
            jobs.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
            jobs.truncate(limit as usize);
            jobs
        }
    };

    Ok(Json(JobListResponse { jobs }))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobStatus>, ApiError> {
    let status = state.status().get_status(&JobId::from(id))?;
    Ok(Json(status))
}
