//! Job executor: runs one job's handler and records the outcome.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinError;

use filevault_core::config::SchedulerConfig;
use filevault_core::types::id::{ExecutionLogId, JobId};
use filevault_entity::job::log::{LogCompletion, LogStatus, NewExecutionLog};
use filevault_entity::job::model::Job;
use filevault_entity::job::status::JobStatus;

use crate::clock::Clock;
use crate::error::ExecutionError;
use crate::registry::{TaskContext, TaskRegistry};
use crate::store::JobStore;

/// Result of one execution attempt.
pub type ExecutionOutcome = Result<ExecutionReport, ExecutionError>;

/// What a successful execution did.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    /// The job that ran.
    pub job_id: JobId,
    /// The log entry recording the run.
    pub log_id: ExecutionLogId,
    /// Job status after the run.
    pub status: JobStatus,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub completed_at: DateTime<Utc>,
    /// Summary returned by the handler.
    pub summary: Option<Value>,
    /// Completion message written to the log.
    pub message: String,
}

/// Marks a job as running until dropped.
#[derive(Debug)]
struct RunningGuard {
    running: Arc<DashSet<JobId>>,
    job_id: JobId,
}

impl RunningGuard {
    fn acquire(running: &Arc<DashSet<JobId>>, job_id: JobId) -> Option<Self> {
        running.insert(job_id).then(|| Self {
            running: Arc::clone(running),
            job_id,
        })
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.running.remove(&self.job_id);
    }
}

/// A job that has been admitted for execution and holds its single-flight
/// slot. Dropping it without executing releases the slot.
#[derive(Debug)]
pub struct Admission {
    job: Job,
    _guard: RunningGuard,
}

impl Admission {
    /// The admitted job.
    pub fn job(&self) -> &Job {
        &self.job
    }
}

/// Runs job handlers with single-flight, a global concurrency cap,
/// timeouts, and panic isolation.
#[derive(Debug)]
pub struct Executor {
    store: Arc<dyn JobStore>,
    registry: Arc<TaskRegistry>,
    clock: Clock,
    permits: Arc<Semaphore>,
    max_concurrent: u32,
    default_timeout: Duration,
    running: Arc<DashSet<JobId>>,
}

impl Executor {
    /// Create an executor.
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<TaskRegistry>,
        clock: Clock,
        config: &SchedulerConfig,
    ) -> Self {
        let max_concurrent = config.max_concurrent_executions.clamp(1, u32::MAX as usize);
        Self {
            store,
            registry,
            clock,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent: max_concurrent as u32,
            default_timeout: config.handler_timeout(),
            running: Arc::new(DashSet::new()),
        }
    }

    /// The registry handlers are looked up in.
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Whether an execution of this job is in progress.
    pub fn is_running(&self, job_id: JobId) -> bool {
        self.running.contains(&job_id)
    }

    /// Number of executions in progress.
    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Claim the job's single-flight slot without running anything.
    ///
    /// A request for a job that is already running is rejected before
    /// anything is written, so every `started` log entry receives exactly
    /// one terminal update.
    ///
    /// Callers that must order the start of a run against other mutations
    /// admit while holding the job lock and execute after releasing it.
    pub fn admit(&self, job: Job) -> Result<Admission, ExecutionError> {
        match RunningGuard::acquire(&self.running, job.id) {
            Some(guard) => Ok(Admission { job, _guard: guard }),
            None => {
                tracing::debug!(job_id = %job.id, "Execution rejected, job already running");
                Err(ExecutionError::AlreadyRunning(job.id))
            }
        }
    }

    /// Run an admitted job and record the outcome.
    pub async fn execute(&self, admission: Admission) -> ExecutionOutcome {
        let job = &admission.job;

        let _permit = self.permits.acquire().await.map_err(|_| {
            ExecutionError::Store(filevault_core::AppError::service_unavailable(
                "Executor is shut down",
            ))
        })?;

        let started_at = self.clock.now();
        let entry = self
            .store
            .append_log(NewExecutionLog {
                job_id: job.id,
                message: format!("Job {} started", job.name),
                started_at,
            })
            .await?;

        tracing::info!(
            job_id = %job.id,
            job_type = %job.job_type,
            "Job '{}' started",
            job.name
        );

        let result = self.invoke(job, started_at).await;
        let completed_at = self.clock.now();

        let (log_status, job_status, message) = match &result {
            Ok(summary) => (
                LogStatus::Completed,
                success_status(job),
                completion_message(job, summary.as_ref()),
            ),
            Err(e) => (
                LogStatus::Failed,
                JobStatus::Failed,
                format!("Job {} failed: {}", job.name, e),
            ),
        };

        match &result {
            Ok(_) => tracing::info!(job_id = %job.id, "{}", message),
            Err(_) => tracing::warn!(job_id = %job.id, "{}", message),
        }

        let finished = self
            .store
            .finish_log(
                entry.id,
                LogCompletion {
                    status: log_status,
                    message: message.clone(),
                    completed_at,
                },
            )
            .await;
        if let Err(e) = &finished {
            tracing::error!(job_id = %job.id, log_id = %entry.id, "Failed to finish execution log: {}", e);
        }

        let recorded = self.store.record_run(job.id, job_status, started_at).await;
        if let Err(e) = &recorded {
            tracing::error!(job_id = %job.id, "Failed to record job run: {}", e);
        }

        let summary = result?;
        finished?;
        recorded?;

        Ok(ExecutionReport {
            job_id: job.id,
            log_id: entry.id,
            status: job_status,
            started_at,
            completed_at,
            summary,
            message,
        })
    }

    /// Look up the handler and run it in its own task under a timeout.
    async fn invoke(
        &self,
        job: &Job,
        started_at: DateTime<Utc>,
    ) -> Result<Option<Value>, ExecutionError> {
        let handler = self
            .registry
            .get(job.job_type)
            .ok_or(ExecutionError::UnregisteredHandler(job.job_type))?;
        let timeout = handler.timeout().unwrap_or(self.default_timeout);

        let ctx = TaskContext {
            job_id: job.id,
            job_name: job.name.clone(),
            owner_id: job.owner_id,
            config: job.config.clone(),
            started_at,
        };

        let mut task = tokio::spawn(async move { handler.execute(ctx).await });

        match tokio::time::timeout(timeout, &mut task).await {
            Err(_) => {
                task.abort();
                Err(ExecutionError::TimedOut(timeout))
            }
            Ok(Ok(Ok(summary))) => Ok(summary),
            Ok(Ok(Err(e))) => Err(ExecutionError::Handler(e.to_string())),
            Ok(Err(join_err)) => Err(ExecutionError::Handler(describe_join_error(join_err))),
        }
    }

    /// Wait until no execution holds a permit, or the grace period elapses.
    ///
    /// Returns `true` if every execution finished in time.
    pub async fn wait_idle(&self, grace: Duration) -> bool {
        match tokio::time::timeout(grace, self.permits.acquire_many(self.max_concurrent)).await {
            Ok(Ok(_all)) => true,
            Ok(Err(_)) => true,
            Err(_) => {
                tracing::warn!(
                    running = self.running_count(),
                    "Grace period elapsed with executions still running"
                );
                false
            }
        }
    }
}

/// Status after a successful run: scheduled jobs stay active, on-demand jobs
/// complete, and paused jobs stay paused.
fn success_status(job: &Job) -> JobStatus {
    if !job.is_active {
        JobStatus::Paused
    } else if job.schedule.is_some() {
        JobStatus::Active
    } else {
        JobStatus::Completed
    }
}

fn completion_message(job: &Job, summary: Option<&Value>) -> String {
    match summary {
        Some(summary) => format!("Job {} completed successfully: {}", job.name, summary),
        None => format!("Job {} completed successfully", job.name),
    }
}

fn describe_join_error(err: JoinError) -> String {
    if !err.is_panic() {
        return "Handler task was cancelled".to_string();
    }
    let payload = err.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("Handler panicked: {detail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use filevault_core::types::id::UserId;
    use filevault_entity::job::status::JobType;

    fn job(schedule: Option<&str>, is_active: bool) -> Job {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        Job {
            id: JobId::new(),
            owner_id: UserId::new(),
            name: "nightly".to_string(),
            job_type: JobType::Webhook,
            schedule: schedule.map(str::to_string),
            config: serde_json::json!({}),
            last_run: None,
            next_run: None,
            status: JobStatus::Active,
            is_active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_success_status() {
        assert_eq!(success_status(&job(Some("* * * * *"), true)), JobStatus::Active);
        assert_eq!(success_status(&job(None, true)), JobStatus::Completed);
        assert_eq!(success_status(&job(Some("* * * * *"), false)), JobStatus::Paused);
    }

    #[test]
    fn test_completion_message_appends_summary() {
        let j = job(None, true);
        assert_eq!(
            completion_message(&j, None),
            "Job nightly completed successfully"
        );
        assert_eq!(
            completion_message(&j, Some(&serde_json::json!({"purged_files": 2}))),
            r#"Job nightly completed successfully: {"purged_files":2}"#
        );
    }

    #[test]
    fn test_running_guard_is_exclusive() {
        let running = Arc::new(DashSet::new());
        let id = JobId::new();

        let guard = RunningGuard::acquire(&running, id);
        assert!(guard.is_some());
        assert!(RunningGuard::acquire(&running, id).is_none());

        drop(guard);
        assert!(RunningGuard::acquire(&running, id).is_some());
    }
}
