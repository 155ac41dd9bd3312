//! Durable job store with conditional transitions.
//!
//! `transition` is a compare-and-set on the current state column: concurrent
//! or duplicate processing of the same job cannot race into an inconsistent
//! record. A `Conflict` result means another delivery already advanced the
//! job; the caller re-reads and either no-ops or resumes.

use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use super::{now_utc, Job, JobState};
use crate::db::DatabaseError;

/// Outcome of a conditional transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The job was in one of the expected states and has been advanced.
    Applied,
    /// Another delivery advanced the job first; re-read and resume.
    Conflict,
}

/// Fields written alongside a state transition.
#[derive(Debug, Default)]
pub struct JobUpdate {
    pub result_text: Option<String>,
    pub failure_reason: Option<String>,
    /// Increment the attempt counter (set when entering `TRANSLATING`).
    pub bump_attempt: bool,
}

impl JobUpdate {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn completed(result_text: String) -> Self {
        Self {
            result_text: Some(result_text),
            ..Self::default()
        }
    }

    pub fn failed(reason: String) -> Self {
        Self {
            failure_reason: Some(reason),
            ..Self::default()
        }
    }
}

/// Persistence contract for job records. The store is the only shared
/// mutable resource across workers; all mutation goes through `transition`.
pub trait JobStore: Send + Sync {
    fn get(&self, job_id: &str) -> Result<Option<Job>, DatabaseError>;

    /// Insert a job if absent. Returns false when a record already exists
    /// (benign: another delivery created it first).
    fn create(&self, job: &Job) -> Result<bool, DatabaseError>;

    /// Conditionally advance `job_id` from one of `expected` to `new_state`,
    /// writing `update` in the same statement.
    fn transition(
        &self,
        job_id: &str,
        expected: &[JobState],
        new_state: JobState,
        update: JobUpdate,
    ) -> Result<Transition, DatabaseError>;
}

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl JobStore for SqliteJobStore {
    fn get(&self, job_id: &str) -> Result<Option<Job>, DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        let row = conn
            .query_row(
                "SELECT job_id, blob_key, source_language, target_language, state,
                        attempt, result_text, failure_reason, created_at, updated_at
                 FROM jobs WHERE job_id = ?1",
                params![job_id],
                |row| {
                    Ok(JobRow {
                        job_id: row.get(0)?,
                        blob_key: row.get(1)?,
                        source_language: row.get(2)?,
                        target_language: row.get(3)?,
                        state: row.get(4)?,
                        attempt: row.get(5)?,
                        result_text: row.get(6)?,
                        failure_reason: row.get(7)?,
                        created_at: row.get(8)?,
                        updated_at: row.get(9)?,
                    })
                },
            )
            .optional()?;

        row.map(job_from_row).transpose()
    }

    fn create(&self, job: &Job) -> Result<bool, DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO jobs
             (job_id, blob_key, source_language, target_language, state,
              attempt, result_text, failure_reason, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                job.job_id,
                job.blob_key,
                job.source_language,
                job.target_language,
                job.state.as_str(),
                job.attempt,
                job.result_text,
                job.failure_reason,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(inserted == 1)
    }

    fn transition(
        &self,
        job_id: &str,
        expected: &[JobState],
        new_state: JobState,
        update: JobUpdate,
    ) -> Result<Transition, DatabaseError> {
        for from in expected {
            if !from.can_advance_to(new_state) {
                return Err(DatabaseError::IllegalTransition {
                    from: from.as_str().to_string(),
                    to: new_state.as_str().to_string(),
                });
            }
        }

        // State names are a closed enum, safe to inline into the IN list.
        let expected_list = expected
            .iter()
            .map(|s| format!("'{}'", s.as_str()))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "UPDATE jobs
             SET state = ?1,
                 result_text = COALESCE(?2, result_text),
                 failure_reason = COALESCE(?3, failure_reason),
                 attempt = attempt + ?4,
                 updated_at = ?5
             WHERE job_id = ?6 AND state IN ({expected_list})"
        );

        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        let changed = conn.execute(
            &sql,
            params![
                new_state.as_str(),
                update.result_text,
                update.failure_reason,
                if update.bump_attempt { 1 } else { 0 },
                now_utc(),
                job_id,
            ],
        )?;

        if changed == 1 {
            Ok(Transition::Applied)
        } else {
            Ok(Transition::Conflict)
        }
    }
}

struct JobRow {
    job_id: String,
    blob_key: String,
    source_language: String,
    target_language: String,
    state: String,
    attempt: u32,
    result_text: Option<String>,
    failure_reason: Option<String>,
    created_at: String,
    updated_at: String,
}

fn job_from_row(row: JobRow) -> Result<Job, DatabaseError> {
    let state = JobState::from_str(&row.state).ok_or_else(|| DatabaseError::InvalidEnum {
        field: "state".to_string(),
        value: row.state.clone(),
    })?;

    Ok(Job {
        job_id: row.job_id,
        blob_key: row.blob_key,
        source_language: row.source_language,
        target_language: row.target_language,
        state,
        attempt: row.attempt,
        result_text: row.result_text,
        failure_reason: row.failure_reason,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
