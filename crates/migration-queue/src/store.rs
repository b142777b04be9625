//! The durable job store: Postgres-backed persistence for
//! `migration_jobs`, so a form's queued work survives a process restart.

use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::job::{Job, JobPayload, JobStatus};

pub struct JobStore {
    pool: PgPool,
}

impl JobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn enqueue(
        &self,
        form_id: Uuid,
        payload: JobPayload,
        max_attempts: i32,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let payload_json = serde_json::to_value(&payload)?;
        sqlx::query(
            r#"INSERT INTO migration_jobs
               (id, form_id, payload, status, attempts, max_attempts, next_run_at, requested_by, created_at, updated_at)
               VALUES ($1, $2, $3, $4, 0, $5, $6, $7, $8, $8)"#,
        )
        .bind(id)
        .bind(form_id)
        .bind(payload_json)
        .bind(JobStatus::Waiting.as_str())
        .bind(max_attempts)
        .bind(now)
        .bind(&payload.requested_by)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(id)
    }

    /// Atomically claims the earliest-due waiting job for `form_id`, if
    /// any, marking it active. Used by that form's worker loop.
    pub async fn claim_next(&self, form_id: Uuid) -> Result<Option<Job>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let row = sqlx::query(
            r#"SELECT id, form_id, payload, status, attempts, max_attempts, next_run_at,
                      last_error, requested_by, created_at, updated_at
               FROM migration_jobs
               WHERE form_id = $1 AND status = 'waiting' AND next_run_at <= $2
               ORDER BY next_run_at ASC, created_at ASC
               LIMIT 1
               FOR UPDATE SKIP LOCKED"#,
        )
        .bind(form_id)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            tx.commit().await.map_err(Error::Database)?;
            return Ok(None);
        };
        let job = row_to_job(row)?;

        sqlx::query("UPDATE migration_jobs SET status = 'active', updated_at = $2 WHERE id = $1")
            .bind(job.id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        tx.commit().await.map_err(Error::Database)?;

        Ok(Some(Job {
            status: JobStatus::Active,
            ..job
        }))
    }

    pub async fn mark_completed(&self, job_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE migration_jobs SET status = 'completed', updated_at = $2 WHERE id = $1")
            .bind(job_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Records a failed attempt. If `attempts` has not yet reached
    /// `max_attempts`, reschedules as waiting at the backed-off
    /// `next_run_at`; otherwise marks the job terminally failed.
    pub async fn mark_attempt_failed(
        &self,
        job_id: Uuid,
        error: &str,
        next_run_at: chrono::DateTime<Utc>,
        terminal: bool,
    ) -> Result<()> {
        let status = if terminal { JobStatus::Failed } else { JobStatus::Waiting };
        sqlx::query(
            r#"UPDATE migration_jobs
               SET status = $2, attempts = attempts + 1, last_error = $3, next_run_at = $4, updated_at = $5
               WHERE id = $1"#,
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(error)
        .bind(next_run_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Cancels a job that is still waiting. Fails with `NotCancellable`
    /// if it has already been claimed or finished (:
    /// cancellation only while waiting).
    pub async fn cancel_waiting(&self, job_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE migration_jobs SET status = 'failed', last_error = 'cancelled', updated_at = $2 \
             WHERE id = $1 AND status = 'waiting'",
        )
        .bind(job_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotCancellable(job_id));
        }
        Ok(())
    }

    pub async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query(
            r#"SELECT id, form_id, payload, status, attempts, max_attempts, next_run_at,
                      last_error, requested_by, created_at, updated_at
               FROM migration_jobs WHERE id = $1"#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.map(row_to_job).transpose()
    }

    /// `status`: a snapshot of a form's queue.
    pub async fn status_for_form(&self, form_id: Uuid) -> Result<Vec<Job>> {
        let rows = sqlx::query(
            r#"SELECT id, form_id, payload, status, attempts, max_attempts, next_run_at,
                      last_error, requested_by, created_at, updated_at
               FROM migration_jobs WHERE form_id = $1 ORDER BY created_at ASC"#,
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.into_iter().map(row_to_job).collect()
    }

    /// `drainCompleted`: remove completed jobs for `form_id` last
    /// updated at or before `older_than`, so the table does not grow
    /// without bound.
    pub async fn drain_completed(&self, form_id: Uuid, older_than: chrono::DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM migration_jobs WHERE form_id = $1 AND status = 'completed' AND updated_at <= $2",
        )
        .bind(form_id)
        .bind(older_than)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    /// `drainFailed`: remove terminally failed jobs for `form_id`
    /// last updated at or before `older_than`.
    pub async fn drain_failed(&self, form_id: Uuid, older_than: chrono::DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM migration_jobs WHERE form_id = $1 AND status = 'failed' AND updated_at <= $2",
        )
        .bind(form_id)
        .bind(older_than)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    /// Whether any form currently has a waiting or active job — used by
    /// the scheduler to decide whether a worker should keep living.
    pub async fn has_pending_work(&self, form_id: Uuid) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM migration_jobs WHERE form_id = $1 AND status IN ('waiting', 'active')",
        )
        .bind(form_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count > 0)
    }
}

fn row_to_job(row: sqlx::postgres::PgRow) -> Result<Job> {
    let status_raw: String = row.try_get("status").map_err(Error::Database)?;
    let payload_json: serde_json::Value = row.try_get("payload").map_err(Error::Database)?;
    let payload: JobPayload = serde_json::from_value(payload_json)?;
    Ok(Job {
        id: row.try_get("id").map_err(Error::Database)?,
        form_id: row.try_get("form_id").map_err(Error::Database)?,
        action: payload.action,
        status: JobStatus::parse(&status_raw),
        attempts: row.try_get("attempts").map_err(Error::Database)?,
        max_attempts: row.try_get("max_attempts").map_err(Error::Database)?,
        next_run_at: row.try_get("next_run_at").map_err(Error::Database)?,
        last_error: row.try_get("last_error").map_err(Error::Database)?,
        requested_by: row.try_get("requested_by").map_err(Error::Database)?,
        created_at: row.try_get("created_at").map_err(Error::Database)?,
        updated_at: row.try_get("updated_at").map_err(Error::Database)?,
    })
}
