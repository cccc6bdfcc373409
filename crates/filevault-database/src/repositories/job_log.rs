//! Execution log repository implementation.

use sqlx::PgPool;

use filevault_core::error::{AppError, ErrorKind};
use filevault_core::result::AppResult;
use filevault_core::types::id::{ExecutionLogId, JobId};
use filevault_core::types::pagination::{PageRequest, PageResponse};
use filevault_entity::job::log::{ExecutionLog, LogCompletion, NewExecutionLog};

/// Repository for the append-only job execution history.
#[derive(Debug, Clone)]
pub struct JobLogRepository {
    pool: PgPool,
}

impl JobLogRepository {
    /// Create a new execution log repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a `started` entry.
    pub async fn append(&self, entry: &NewExecutionLog) -> AppResult<ExecutionLog> {
        sqlx::query_as::<_, ExecutionLog>(
            "INSERT INTO job_logs (id, job_id, status, message, started_at) \
             VALUES ($1, $2, 'started', $3, $4) RETURNING *",
        )
        .bind(ExecutionLogId::new())
        .bind(entry.job_id)
        .bind(&entry.message)
        .bind(entry.started_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to append job log", e))
    }

    /// Apply the terminal update of a running entry.
    ///
    /// Returns `None` if no `started` entry with this ID exists, which covers
    /// both unknown IDs and entries that are already terminal.
    pub async fn finish(
        &self,
        id: ExecutionLogId,
        completion: &LogCompletion,
    ) -> AppResult<Option<ExecutionLog>> {
        sqlx::query_as::<_, ExecutionLog>(
            "UPDATE job_logs SET status = $2, message = $3, completed_at = $4 \
             WHERE id = $1 AND status = 'started' RETURNING *",
        )
        .bind(id)
        .bind(completion.status)
        .bind(&completion.message)
        .bind(completion.completed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to finish job log", e))
    }

    /// Find a log entry by ID.
    pub async fn find_by_id(&self, id: ExecutionLogId) -> AppResult<Option<ExecutionLog>> {
        sqlx::query_as::<_, ExecutionLog>("SELECT * FROM job_logs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find job log", e))
    }

    /// List a job's history, newest first.
    pub async fn list_for_job(
        &self,
        job_id: JobId,
        page: &PageRequest,
    ) -> AppResult<PageResponse<ExecutionLog>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_logs WHERE job_id = $1")
            .bind(job_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count job logs", e)
            })?;

        let logs = sqlx::query_as::<_, ExecutionLog>(
            "SELECT * FROM job_logs WHERE job_id = $1 \
             ORDER BY started_at DESC, id DESC LIMIT $2 OFFSET $3",
        )
        .bind(job_id)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list job logs", e))?;

        Ok(PageResponse::new(logs, page, total as u64))
    }
}
