//! Durable job state.
//!
//! The store owns job definitions and the execution history. It never calls
//! handlers; the scheduler and executor drive it.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use filevault_core::result::AppResult;
use filevault_core::types::id::{ExecutionLogId, JobId};
use filevault_core::types::pagination::{PageRequest, PageResponse};
use filevault_entity::job::log::{ExecutionLog, LogCompletion, NewExecutionLog};
use filevault_entity::job::model::{Job, JobCounts, JobFilter, UpdateJob};
use filevault_entity::job::status::JobStatus;

pub use memory::MemoryJobStore;
pub use postgres::PgJobStore;

/// Persistence for jobs and their execution logs.
#[async_trait]
pub trait JobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a fully built job.
    async fn create(&self, job: Job) -> AppResult<Job>;

    /// Fetch one job.
    async fn get(&self, id: JobId) -> AppResult<Option<Job>>;

    /// List jobs matching `filter`, newest first.
    async fn list(&self, filter: &JobFilter) -> AppResult<Vec<Job>>;

    /// Apply a partial update. `None` if the job does not exist.
    ///
    /// Changing `is_active` also moves `status` to `active` or `paused`.
    async fn update(&self, id: JobId, patch: &UpdateJob) -> AppResult<Option<Job>>;

    /// Delete a job definition. Its logs are retained.
    async fn delete(&self, id: JobId) -> AppResult<bool>;

    /// Record the outcome of a run started at `last_run`.
    async fn record_run(
        &self,
        id: JobId,
        status: JobStatus,
        last_run: DateTime<Utc>,
    ) -> AppResult<Option<Job>>;

    /// Persist the armed fire time, or clear it.
    async fn set_next_run(&self, id: JobId, next_run: Option<DateTime<Utc>>) -> AppResult<()>;

    /// Overwrite the status without recording a run.
    async fn set_status(&self, id: JobId, status: JobStatus) -> AppResult<()>;

    /// Append a `started` log entry.
    async fn append_log(&self, entry: NewExecutionLog) -> AppResult<ExecutionLog>;

    /// Apply the single terminal update to a log entry.
    ///
    /// Fails with `NotFound` for unknown entries and `Conflict` for entries
    /// that are already terminal.
    async fn finish_log(
        &self,
        id: ExecutionLogId,
        completion: LogCompletion,
    ) -> AppResult<ExecutionLog>;

    /// A page of one job's history, newest first.
    async fn list_logs(
        &self,
        job_id: JobId,
        page: &PageRequest,
    ) -> AppResult<PageResponse<ExecutionLog>>;

    /// Aggregate job counts.
    async fn counts(&self) -> AppResult<JobCounts>;
}
