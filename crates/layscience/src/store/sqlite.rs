//! SQLite-backed job store.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::db::job_repo::{self, JobRow, StateUpdate, TransitionOutcome};
use crate::db::Database;
use crate::error::StoreError;
use crate::job::{
    ErrorKind, FailureCause, Job, JobError, JobId, JobInput, JobOptions, JobPatch, JobResult,
    JobState,
};

use super::{validate_transition, JobStore};

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Fixed-width RFC 3339 so `ORDER BY created_at` sorts chronologically.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str, job_id: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(job_id, format!("bad timestamp '{}': {}", s, e)))
}

fn parse_state(s: &str, job_id: &str) -> Result<JobState, StoreError> {
    s.parse::<JobState>()
        .map_err(|_| corrupt(job_id, format!("unknown state '{}'", s)))
}

fn corrupt(job_id: &str, reason: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        id: job_id.to_string(),
        reason: reason.into(),
    }
}

fn to_json<T: serde::Serialize>(value: &T, job_id: &str) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| corrupt(job_id, e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(s: &str, job_id: &str) -> Result<T, StoreError> {
    serde_json::from_str(s).map_err(|e| corrupt(job_id, e.to_string()))
}

fn job_to_row(job: &Job) -> Result<JobRow, StoreError> {
    let id = job.id.as_str();
    Ok(JobRow {
        id: id.to_string(),
        state: job.state.as_str().to_string(),
        input_json: to_json(&job.input, id)?,
        options_json: to_json(&job.options, id)?,
        result_json: job.result.as_ref().map(|r| to_json(r, id)).transpose()?,
        error_kind: job.error.as_ref().map(|e| e.kind.as_str().to_string()),
        error_cause: job
            .error
            .as_ref()
            .and_then(|e| e.cause)
            .map(|c| c.as_str().to_string()),
        error_message: job.error.as_ref().map(|e| e.message.clone()),
        error_attempts: job.error.as_ref().map(|e| e.attempts),
        created_at: format_timestamp(job.created_at),
        updated_at: format_timestamp(job.updated_at),
    })
}

fn row_to_job(row: JobRow) -> Result<Job, StoreError> {
    let id = row.id.as_str();

    let error = match row.error_kind.as_deref() {
        Some(kind) => Some(JobError {
            kind: kind.parse::<ErrorKind>().map_err(|e| corrupt(id, e))?,
            cause: row
                .error_cause
                .as_deref()
                .map(|c| c.parse::<FailureCause>())
                .transpose()
                .map_err(|e| corrupt(id, e))?,
            message: row.error_message.clone().unwrap_or_default(),
            attempts: row.error_attempts.unwrap_or(1),
        }),
        None => None,
    };

    Ok(Job {
        id: JobId::from(id),
        state: parse_state(&row.state, id)?,
        input: from_json::<JobInput>(&row.input_json, id)?,
        options: from_json::<JobOptions>(&row.options_json, id)?,
        result: row
            .result_json
            .as_deref()
            .map(|s| from_json::<JobResult>(s, id))
            .transpose()?,
        error,
        created_at: parse_timestamp(&row.created_at, id)?,
        updated_at: parse_timestamp(&row.updated_at, id)?,
    })
}

fn patch_to_update(
    new: JobState,
    patch: &JobPatch,
    now: DateTime<Utc>,
    job_id: &str,
) -> Result<StateUpdate, StoreError> {
    let mut update = StateUpdate {
        state: new.as_str().to_string(),
        updated_at: format_timestamp(now),
        ..Default::default()
    };
    match patch {
        JobPatch::Empty => {}
        JobPatch::Done(result) => update.result_json = Some(to_json(result, job_id)?),
        JobPatch::Failed(error) => {
            update.error_kind = Some(error.kind.as_str().to_string());
            update.error_cause = error.cause.map(|c| c.as_str().to_string());
            update.error_message = Some(error.message.clone());
            update.error_attempts = Some(error.attempts);
        }
    }
    Ok(update)
}

// ─── SqliteJobStore ─────────────────────────────────────────────────────────

/// Persistent job store backed by rusqlite.
///
/// All operations are synchronous and hold the connection mutex for a single
/// statement (plus a re-read for transitions).
#[derive(Clone)]
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Opens (or creates) the job database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Number of jobs currently in `state`.
    pub fn count(&self, state: JobState) -> Result<u64, StoreError> {
        Ok(job_repo::count_by_state(&self.db, state.as_str())?)
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, input: JobInput, options: JobOptions) -> Result<Job, StoreError> {
        let job = Job::new(input, options);
        let row = job_to_row(&job)?;
        job_repo::insert(&self.db, &row)?;
        log::debug!("Created job {} ({})", job.id, job.input.kind());
        // Re-read so the caller sees timestamps at stored precision.
        self.get(&job.id)
    }

    fn get(&self, id: &JobId) -> Result<Job, StoreError> {
        match job_repo::find_by_id(&self.db, id.as_str())? {
            Some(row) => row_to_job(row),
            None => Err(StoreError::NotFound(id.clone())),
        }
    }

    fn transition(
        &self,
        id: &JobId,
        expected: JobState,
        new: JobState,
        patch: JobPatch,
    ) -> Result<Job, StoreError> {
        validate_transition(expected, new, &patch)?;
        let update = patch_to_update(new, &patch, Utc::now(), id.as_str())?;

        match job_repo::transition(&self.db, id.as_str(), expected.as_str(), &update)? {
            TransitionOutcome::Applied(row) => {
                log::debug!("Job {} {} -> {}", id, expected, new);
                row_to_job(row)
            }
            TransitionOutcome::Conflict(actual) => Err(StoreError::Conflict {
                id: id.clone(),
                expected,
                actual: parse_state(&actual, id.as_str())?,
            }),
            TransitionOutcome::Missing => Err(StoreError::NotFound(id.clone())),
        }
    }

    fn list(&self, state: JobState, limit: u32) -> Result<Vec<Job>, StoreError> {
        job_repo::list_by_state(&self.db, state.as_str(), limit)?
            .into_iter()
            .map(row_to_job)
            .collect()
    }
}
