//! CRUD helpers for [`Job`] reference records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use hirelink_shared::types::{JobId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Job;

impl Database {
    /// Insert a new job record.
    pub fn insert_job(&self, job: &Job) -> Result<()> {
        self.conn().execute(
            "INSERT INTO jobs (id, title, employer_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                job.id.to_string(),
                job.title,
                job.employer_id.to_string(),
                job.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a single job by id.
    pub fn job_by_id(&self, id: JobId) -> Result<Job> {
        self.conn()
            .query_row(
                "SELECT id, title, employer_id, created_at FROM jobs WHERE id = ?1",
                params![id.to_string()],
                row_to_job,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::JobNotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Cheap existence probe used by message validation.
    pub fn job_exists(&self, id: JobId) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM jobs WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Delete a job row. Exists so tests can exercise the "job vanished"
    /// path; job lifecycle otherwise belongs to the marketplace CRUD layer.
    pub fn delete_job(&self, id: JobId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM jobs WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    let id_str: String = row.get(0)?;
    let title: String = row.get(1)?;
    let employer_str: String = row.get(2)?;
    let ts_str: String = row.get(3)?;

    let id = JobId::parse(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let employer_id = UserId::parse(&employer_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Job {
        id,
        title,
        employer_id,
        created_at,
    })
}
