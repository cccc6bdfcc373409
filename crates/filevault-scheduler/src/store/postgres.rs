//! PostgreSQL-backed [`JobStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use filevault_core::error::AppError;
use filevault_core::result::AppResult;
use filevault_core::types::id::{ExecutionLogId, JobId};
use filevault_core::types::pagination::{PageRequest, PageResponse};
use filevault_database::repositories::{JobLogRepository, JobRepository};
use filevault_entity::job::log::{ExecutionLog, LogCompletion, NewExecutionLog};
use filevault_entity::job::model::{Job, JobCounts, JobFilter, UpdateJob};
use filevault_entity::job::status::JobStatus;

use super::JobStore;

/// Job store over the `jobs` and `job_logs` tables.
#[derive(Debug, Clone)]
pub struct PgJobStore {
    jobs: JobRepository,
    logs: JobLogRepository,
}

impl PgJobStore {
    /// Create a store on an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            jobs: JobRepository::new(pool.clone()),
            logs: JobLogRepository::new(pool),
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: Job) -> AppResult<Job> {
        self.jobs.create(&job).await
    }

    async fn get(&self, id: JobId) -> AppResult<Option<Job>> {
        self.jobs.find_by_id(id).await
    }

    async fn list(&self, filter: &JobFilter) -> AppResult<Vec<Job>> {
        self.jobs.list(filter).await
    }

    async fn update(&self, id: JobId, patch: &UpdateJob) -> AppResult<Option<Job>> {
        self.jobs.update(id, patch).await
    }

    async fn delete(&self, id: JobId) -> AppResult<bool> {
        self.jobs.delete(id).await
    }

    async fn record_run(
        &self,
        id: JobId,
        status: JobStatus,
        last_run: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        self.jobs.record_run(id, status, last_run).await
    }

    async fn set_next_run(&self, id: JobId, next_run: Option<DateTime<Utc>>) -> AppResult<()> {
        self.jobs.set_next_run(id, next_run).await.map(|_| ())
    }

    async fn set_status(&self, id: JobId, status: JobStatus) -> AppResult<()> {
        self.jobs.set_status(id, status).await.map(|_| ())
    }

    async fn append_log(&self, entry: NewExecutionLog) -> AppResult<ExecutionLog> {
        self.logs.append(&entry).await
    }

    async fn finish_log(
        &self,
        id: ExecutionLogId,
        completion: LogCompletion,
    ) -> AppResult<ExecutionLog> {
        if let Some(entry) = self.logs.finish(id, &completion).await? {
            return Ok(entry);
        }
        match self.logs.find_by_id(id).await? {
            Some(entry) => Err(AppError::conflict(format!(
                "Execution log {id} is already {}",
                entry.status
            ))),
            None => Err(AppError::not_found(format!("Execution log not found: {id}"))),
        }
    }

    async fn list_logs(
        &self,
        job_id: JobId,
        page: &PageRequest,
    ) -> AppResult<PageResponse<ExecutionLog>> {
        self.logs.list_for_job(job_id, page).await
    }

    async fn counts(&self) -> AppResult<JobCounts> {
        self.jobs.counts().await
    }
}
