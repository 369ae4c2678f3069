//! Embedded schema migrations.
//!
//! Each step runs in its own transaction together with its row in
//! `_migrations`, so a crash never leaves a step half-recorded.

use std::collections::BTreeSet;

use rusqlite::{params, Connection};

use super::error::DatabaseError;

struct Step {
    version: u32,
    name: &'static str,
    sql: &'static str,
    /// `(table, column)` that makes the step a no-op when already present.
    unless_column: Option<(&'static str, &'static str)>,
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        name: "create_jobs_table",
        sql: include_str!("sql/001_create_jobs.sql"),
        unless_column: None,
    },
    Step {
        version: 2,
        name: "index_jobs_by_state",
        sql: include_str!("sql/002_index_jobs_state.sql"),
        unless_column: None,
    },
    Step {
        version: 3,
        name: "add_error_attempts_to_jobs",
        sql: include_str!("sql/003_add_error_attempts.sql"),
        unless_column: Some(("jobs", "error_attempts")),
    },
];

const CREATE_LEDGER: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    version    INTEGER PRIMARY KEY,
    name       TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);";

fn applied_versions(conn: &Connection) -> Result<BTreeSet<u32>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT version FROM _migrations")?;
    let versions = stmt
        .query_map([], |row| row.get::<_, u32>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(versions)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        params![table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn apply(conn: &Connection, step: &Step) -> Result<(), DatabaseError> {
    let failed = |e: rusqlite::Error| DatabaseError::Migration {
        version: step.version,
        reason: e.to_string(),
    };

    let tx = conn.unchecked_transaction().map_err(failed)?;
    let satisfied = match step.unless_column {
        Some((table, column)) => column_exists(&tx, table, column)?,
        None => false,
    };
    if satisfied {
        log::debug!("Migration v{} already satisfied, recording only", step.version);
    } else {
        tx.execute_batch(step.sql).map_err(failed)?;
    }
    tx.execute(
        "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
        params![step.version, step.name],
    )
    .map_err(failed)?;
    tx.commit().map_err(failed)
}

/// Brings the schema up to date. Returns how many steps were applied.
pub fn run_all(conn: &Connection) -> Result<usize, DatabaseError> {
    conn.execute_batch(CREATE_LEDGER)?;
    let done = applied_versions(conn)?;

    let mut applied = 0;
    for step in STEPS.iter().filter(|s| !done.contains(&s.version)) {
        log::info!("Applying migration v{} ({})", step.version, step.name);
        apply(conn, step)?;
        applied += 1;
    }
    Ok(applied)
}
