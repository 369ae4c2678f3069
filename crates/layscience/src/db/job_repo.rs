//! Job repository: row-level operations on the `jobs` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: String,
    pub state: String,
    pub input_json: String,
    pub options_json: String,
    pub result_json: Option<String>,
    pub error_kind: Option<String>,
    pub error_cause: Option<String>,
    pub error_message: Option<String>,
    pub error_attempts: Option<u32>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            state: row.get("state")?,
            input_json: row.get("input_json")?,
            options_json: row.get("options_json")?,
            result_json: row.get("result_json")?,
            error_kind: row.get("error_kind")?,
            error_cause: row.get("error_cause")?,
            error_message: row.get("error_message")?,
            error_attempts: row.get("error_attempts")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Columns written by a state transition.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub state: String,
    pub result_json: Option<String>,
    pub error_kind: Option<String>,
    pub error_cause: Option<String>,
    pub error_message: Option<String>,
    pub error_attempts: Option<u32>,
    pub updated_at: String,
}

/// Outcome of a conditional state update.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// The row was in the expected state and has been updated.
    Applied(JobRow),
    /// The row exists but is in another state (carried here).
    Conflict(String),
    /// No row with that id.
    Missing,
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, state, input_json, options_json, result_json, error_kind,
             error_cause, error_message, error_attempts, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                job.id,
                job.state,
                job.input_json,
                job.options_json,
                job.result_json,
                job.error_kind,
                job.error_cause,
                job.error_message,
                job.error_attempts,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

fn select_by_id(conn: &Connection, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM jobs WHERE id = ?1",
            params![id],
            JobRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| select_by_id(conn, id))
}

/// Moves a job from `expected_state` to `update.state` in one conditional
/// UPDATE. The affected-row count decides whether the caller won the race;
/// the lock is held only for this statement and the follow-up read.
pub fn transition(
    db: &Database,
    id: &str,
    expected_state: &str,
    update: &StateUpdate,
) -> Result<TransitionOutcome, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET state = ?3, result_json = ?4, error_kind = ?5, error_cause = ?6,
             error_message = ?7, error_attempts = ?8, updated_at = ?9
             WHERE id = ?1 AND state = ?2",
            params![
                id,
                expected_state,
                update.state,
                update.result_json,
                update.error_kind,
                update.error_cause,
                update.error_message,
                update.error_attempts,
                update.updated_at,
            ],
        )?;

        let current = select_by_id(conn, id)?;
        Ok(match (changed, current) {
            (_, None) => TransitionOutcome::Missing,
            (0, Some(row)) => TransitionOutcome::Conflict(row.state),
            (_, Some(row)) => TransitionOutcome::Applied(row),
        })
    })
}

/// Lists jobs in `state`, oldest first.
pub fn list_by_state(db: &Database, state: &str, limit: u32) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE state = ?1 ORDER BY created_at ASC, id ASC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![state, limit], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts jobs in the given state.
pub fn count_by_state(db: &Database, state: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE state = ?1",
            params![state],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
