//! Job repository implementation.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use filevault_core::error::{AppError, ErrorKind};
use filevault_core::result::AppResult;
use filevault_core::types::id::JobId;
use filevault_entity::job::model::{Job, JobCounts, JobFilter, UpdateJob};
use filevault_entity::job::status::JobStatus;

/// Repository for job definitions and their run bookkeeping.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a fully built job row.
    pub async fn create(&self, job: &Job) -> AppResult<Job> {
        sqlx::query_as::<_, Job>(
            "INSERT INTO jobs (id, owner_id, name, job_type, schedule, config, last_run, next_run, \
             status, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING *",
        )
        .bind(job.id)
        .bind(job.owner_id)
        .bind(&job.name)
        .bind(job.job_type)
        .bind(&job.schedule)
        .bind(&job.config)
        .bind(job.last_run)
        .bind(job.next_run)
        .bind(job.status)
        .bind(job.is_active)
        .bind(job.created_at)
        .bind(job.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create job", e))
    }

    /// Find a job by ID.
    pub async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find job", e))
    }

    /// List jobs matching a filter, newest first.
    pub async fn list(&self, filter: &JobFilter) -> AppResult<Vec<Job>> {
        sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs \
             WHERE ($1::uuid IS NULL OR owner_id = $1) \
             AND ($2::job_type IS NULL OR job_type = $2) \
             AND ($3::boolean IS NULL OR is_active = $3) \
             ORDER BY created_at DESC",
        )
        .bind(filter.owner_id)
        .bind(filter.job_type)
        .bind(filter.is_active)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list jobs", e))
    }

    /// Apply a partial update in one statement.
    ///
    /// Returns `None` when the job does not exist.
    pub async fn update(&self, id: JobId, patch: &UpdateJob) -> AppResult<Option<Job>> {
        let status = patch.is_active.map(|active| {
            if active {
                JobStatus::Active
            } else {
                JobStatus::Paused
            }
        });

        sqlx::query_as::<_, Job>(
            "UPDATE jobs SET \
                name = COALESCE($2, name), \
                schedule = CASE WHEN $3 THEN $4 ELSE schedule END, \
                config = COALESCE($5, config), \
                is_active = COALESCE($6, is_active), \
                status = COALESCE($7, status), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&patch.name)
        .bind(patch.schedule.is_some())
        .bind(patch.schedule.clone().flatten())
        .bind(&patch.config)
        .bind(patch.is_active)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update job", e))
    }

    /// Delete a job. Its execution logs are kept.
    pub async fn delete(&self, id: JobId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete job", e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the outcome of a run.
    pub async fn record_run(
        &self,
        id: JobId,
        status: JobStatus,
        last_run: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(
            "UPDATE jobs SET status = $2, last_run = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .bind(last_run)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to record job run", e))
    }

    /// Persist (or clear) the next scheduled fire time.
    pub async fn set_next_run(
        &self,
        id: JobId,
        next_run: Option<DateTime<Utc>>,
    ) -> AppResult<bool> {
        let result = sqlx::query("UPDATE jobs SET next_run = $2 WHERE id = $1")
            .bind(id)
            .bind(next_run)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to set next run", e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    /// Overwrite the status without touching `last_run`.
    pub async fn set_status(&self, id: JobId, status: JobStatus) -> AppResult<bool> {
        let result = sqlx::query("UPDATE jobs SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to set job status", e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    /// Count jobs by state.
    pub async fn counts(&self) -> AppResult<JobCounts> {
        sqlx::query_as::<_, JobCounts>(
            "SELECT COUNT(*) AS total, \
             COUNT(*) FILTER (WHERE is_active) AS active, \
             COUNT(*) FILTER (WHERE status = 'failed') AS failed \
             FROM jobs",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count jobs", e))
    }
}
