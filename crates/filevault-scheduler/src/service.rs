//! Caller-facing job service.
//!
//! Validates mutations, persists them through the [`JobStore`], and keeps
//! the [`Scheduler`] in step with every change to a job's schedule or
//! active flag.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use validator::Validate;

use filevault_core::config::SchedulerConfig;
use filevault_core::error::AppError;
use filevault_core::result::AppResult;
use filevault_core::types::id::JobId;
use filevault_core::types::pagination::{PageRequest, PageResponse};
use filevault_entity::job::log::ExecutionLog;
use filevault_entity::job::model::{CreateJob, Job, JobFilter, UpdateJob};
use filevault_entity::job::status::JobStatus;

use crate::clock::Clock;
use crate::error::JobError;
use crate::executor::{ExecutionOutcome, Executor};
use crate::registry::TaskRegistry;
use crate::schedule::Schedule;
use crate::scheduler::Scheduler;
use crate::store::JobStore;

/// Job and timer counts for the admin summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// All job definitions.
    pub total_jobs: i64,
    /// Jobs with `is_active = true`.
    pub active_jobs: i64,
    /// Jobs whose last run or arm attempt failed.
    pub failed_jobs: i64,
    /// Timers currently armed.
    pub armed_timers: usize,
    /// Executions currently running.
    pub running: usize,
}

/// Job lifecycle operations.
#[derive(Debug, Clone)]
pub struct JobService {
    store: Arc<dyn JobStore>,
    registry: Arc<TaskRegistry>,
    executor: Arc<Executor>,
    scheduler: Scheduler,
    clock: Clock,
}

impl JobService {
    /// Create a new job service.
    pub fn new(
        store: Arc<dyn JobStore>,
        executor: Arc<Executor>,
        scheduler: Scheduler,
        clock: Clock,
    ) -> Self {
        Self {
            registry: Arc::clone(executor.registry()),
            store,
            executor,
            scheduler,
            clock,
        }
    }

    /// Wire an executor and a scheduler over `store` and build the service.
    ///
    /// The scheduler is not started.
    pub fn assemble(
        store: Arc<dyn JobStore>,
        registry: TaskRegistry,
        clock: Clock,
        config: &SchedulerConfig,
    ) -> Self {
        let executor = Arc::new(Executor::new(
            Arc::clone(&store),
            Arc::new(registry),
            clock,
            config,
        ));
        let scheduler = Scheduler::new(Arc::clone(&store), Arc::clone(&executor), clock, config);
        Self::new(store, executor, scheduler, clock)
    }

    /// The scheduler this service drives.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Create a job and arm it if it is active and scheduled.
    pub async fn create(&self, input: CreateJob) -> AppResult<Job> {
        input
            .validate()
            .map_err(|e| AppError::validation(format!("Invalid job: {e}")))?;
        validate_name(&input.name)?;

        let job_type = input.parsed_type().map_err(JobError::from)?;
        if !self.registry.contains(job_type) {
            return Err(JobError::UnknownJobType(job_type.to_string()).into());
        }

        let schedule = normalize_schedule(input.schedule.as_deref(), self.clock.now())?;
        validate_config(&input.config)?;

        let now = self.clock.now();
        let job = Job {
            id: JobId::new(),
            owner_id: input.owner_id,
            name: input.name.trim().to_string(),
            job_type,
            schedule,
            config: input.config,
            last_run: None,
            next_run: None,
            status: if input.is_active {
                JobStatus::Active
            } else {
                JobStatus::Paused
            },
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        };

        let job = self.store.create(job).await?;
        tracing::info!(job_id = %job.id, job_type = %job.job_type, "Created job '{}'", job.name);

        if job.is_schedulable() {
            self.scheduler.reschedule(job.id).await?;
        }
        self.get(job.id).await
    }

    /// Fetch one job.
    pub async fn get(&self, id: JobId) -> AppResult<Job> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| JobError::NotFound(id).into())
    }

    /// List jobs, newest first.
    pub async fn list(&self, filter: &JobFilter) -> AppResult<Vec<Job>> {
        self.store.list(filter).await
    }

    /// Apply a partial update. Changes to the schedule or active flag
    /// re-arm the job before returning.
    pub async fn update(&self, id: JobId, mut patch: UpdateJob) -> AppResult<Job> {
        if patch.is_empty() {
            return Err(AppError::validation("No valid fields to update"));
        }
        patch
            .validate()
            .map_err(|e| AppError::validation(format!("Invalid update: {e}")))?;
        if let Some(name) = &patch.name {
            validate_name(name)?;
            patch.name = Some(name.trim().to_string());
        }
        if let Some(schedule) = &patch.schedule {
            patch.schedule = Some(normalize_schedule(schedule.as_deref(), self.clock.now())?);
        }
        if let Some(config) = &patch.config {
            validate_config(config)?;
        }

        let lock = self.scheduler.lock(id).await;
        let updated = self
            .store
            .update(id, &patch)
            .await?
            .ok_or(JobError::NotFound(id))?;

        if patch.touches_schedule() {
            let state = self.scheduler.rearm(&lock).await?;
            tracing::info!(job_id = %id, state = ?state, "Updated job '{}'", updated.name);
        } else {
            tracing::info!(job_id = %id, "Updated job '{}'", updated.name);
        }
        drop(lock);

        self.get(id).await
    }

    /// Delete a job. No execution can start for it once this returns; a run
    /// already in progress completes and keeps its log entry.
    pub async fn delete(&self, id: JobId) -> AppResult<()> {
        let lock = self.scheduler.lock(id).await;
        self.scheduler.disarm(&lock).await?;
        if !self.store.delete(id).await? {
            return Err(JobError::NotFound(id).into());
        }
        self.scheduler.forget(lock);

        tracing::info!(job_id = %id, "Deleted job");
        Ok(())
    }

    /// Execute a job immediately, subject to single-flight.
    ///
    /// The job is re-read and admitted inside its critical section, so a
    /// run can never start once a concurrent `delete` has returned.
    pub async fn run_now(&self, id: JobId) -> ExecutionOutcome {
        let lock = self.scheduler.lock(id).await;
        let job = self.get(id).await?;
        tracing::info!(job_id = %id, "Manual run requested for '{}'", job.name);
        let admission = self.executor.admit(job)?;
        drop(lock);

        self.executor.execute(admission).await
    }

    /// A page of a job's execution history, newest first.
    ///
    /// History outlives the job, so this works for deleted jobs too.
    pub async fn list_logs(
        &self,
        job_id: JobId,
        page: &PageRequest,
    ) -> AppResult<PageResponse<ExecutionLog>> {
        self.store.list_logs(job_id, page).await
    }

    /// Job and timer counts.
    pub async fn stats(&self) -> AppResult<SchedulerStats> {
        let counts = self.store.counts().await?;
        Ok(SchedulerStats {
            total_jobs: counts.total,
            active_jobs: counts.active,
            failed_jobs: counts.failed,
            armed_timers: self.scheduler.armed_count(),
            running: self.executor.running_count(),
        })
    }
}

fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::validation("Job name must not be empty"));
    }
    Ok(())
}

/// Parse a schedule so invalid expressions, and expressions that never
/// fire after `now`, are rejected synchronously. Blank expressions mean
/// "no schedule".
fn normalize_schedule(schedule: Option<&str>, now: DateTime<Utc>) -> AppResult<Option<String>> {
    match schedule.map(str::trim) {
        None | Some("") => Ok(None),
        Some(expr) => {
            let parsed = Schedule::parse(expr)?;
            parsed.next_fire_time(now)?;
            Ok(Some(parsed.expression().to_string()))
        }
    }
}

fn validate_config(config: &serde_json::Value) -> AppResult<()> {
    if !config.is_object() {
        return Err(AppError::validation("Job config must be a JSON object"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        use chrono::TimeZone;
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_normalize_schedule() {
        assert_eq!(normalize_schedule(None, now()).unwrap(), None);
        assert_eq!(normalize_schedule(Some("  "), now()).unwrap(), None);
        assert_eq!(
            normalize_schedule(Some(" */5 * * * * "), now()).unwrap(),
            Some("*/5 * * * *".to_string())
        );
        assert!(normalize_schedule(Some("every day"), now()).is_err());
    }

    #[test]
    fn test_normalize_schedule_rejects_exhausted_expressions() {
        for expr in ["0 0 30 2 *", "2020-01-01T00:00:00Z", "2026-03-02T12:00:00Z"] {
            let err = normalize_schedule(Some(expr), now()).unwrap_err();
            assert_eq!(err.kind, filevault_core::error::ErrorKind::Validation, "{expr}");
            assert!(err.message.contains("no upcoming occurrence"), "{expr}");
        }
        assert!(normalize_schedule(Some("2026-03-02T12:00:01Z"), now()).is_ok());
    }

    #[test]
    fn test_config_must_be_object() {
        assert!(validate_config(&serde_json::json!({"paths": []})).is_ok());
        assert!(validate_config(&serde_json::json!([1, 2])).is_err());
    }
}
