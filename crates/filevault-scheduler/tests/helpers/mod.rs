//! Shared test helpers for scheduler integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};

use filevault_core::config::SchedulerConfig;
use filevault_core::result::AppResult;
use filevault_core::types::id::{ExecutionLogId, JobId, UserId};
use filevault_core::types::pagination::{PageRequest, PageResponse};
use filevault_entity::job::log::{ExecutionLog, LogCompletion, NewExecutionLog};
use filevault_entity::job::model::{CreateJob, Job, JobCounts, JobFilter, UpdateJob};
use filevault_entity::job::status::{JobStatus, JobType};
use filevault_scheduler::{
    Clock, Executor, JobService, JobStore, MemoryJobStore, Scheduler, TaskContext, TaskError,
    TaskHandler, TaskRegistry,
};

/// Wall time every test starts at: Monday 2026-03-02 12:00:00 UTC.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
}

/// `start_time()` plus `minutes` and `seconds`.
pub fn at(minutes: i64, seconds: i64) -> DateTime<Utc> {
    start_time() + chrono::TimeDelta::minutes(minutes) + chrono::TimeDelta::seconds(seconds)
}

/// Calls observed by the recording handlers.
#[derive(Debug, Default)]
pub struct RecorderState {
    calls: Mutex<Vec<(JobId, DateTime<Utc>)>>,
    current: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl RecorderState {
    /// Number of times `job_id` was executed.
    pub fn calls_for(&self, job_id: JobId) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == job_id)
            .count()
    }

    /// Start times of every execution of `job_id`.
    pub fn started_at(&self, job_id: JobId) -> Vec<DateTime<Utc>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == job_id)
            .map(|(_, at)| *at)
            .collect()
    }

    /// Highest number of overlapping executions seen.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter even when the handler panics or is aborted.
struct InFlight<'a>(&'a RecorderState);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handler whose behavior is driven by the job config:
/// `{"mode": "ok" | "fail" | "panic" | "sleep", "seconds": n}`.
#[derive(Debug)]
pub struct RecordingHandler {
    job_type: JobType,
    state: Arc<RecorderState>,
}

#[async_trait]
impl TaskHandler for RecordingHandler {
    fn job_type(&self) -> JobType {
        self.job_type
    }

    async fn execute(&self, ctx: TaskContext) -> Result<Option<Value>, TaskError> {
        self.state
            .calls
            .lock()
            .unwrap()
            .push((ctx.job_id, ctx.started_at));
        let current = self.state.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_concurrent.fetch_max(current, Ordering::SeqCst);
        let _in_flight = InFlight(&self.state);

        match ctx.config.get("mode").and_then(Value::as_str).unwrap_or("ok") {
            "fail" => Err(TaskError::Failed("handler failure".to_string())),
            "panic" => panic!("handler exploded"),
            "sleep" => {
                let seconds = ctx.config.get("seconds").and_then(Value::as_u64).unwrap_or(60);
                tokio::time::sleep(Duration::from_secs(seconds)).await;
                Ok(Some(json!({"slept": seconds})))
            }
            _ => Ok(None),
        }
    }
}

/// Memory store whose `delete` takes `delay` before removing the job.
#[derive(Debug)]
pub struct SlowDeleteStore {
    inner: Arc<MemoryJobStore>,
    delay: Duration,
}

#[async_trait]
impl JobStore for SlowDeleteStore {
    async fn create(&self, job: Job) -> AppResult<Job> {
        self.inner.create(job).await
    }

    async fn get(&self, id: JobId) -> AppResult<Option<Job>> {
        self.inner.get(id).await
    }

    async fn list(&self, filter: &JobFilter) -> AppResult<Vec<Job>> {
        self.inner.list(filter).await
    }

    async fn update(&self, id: JobId, patch: &UpdateJob) -> AppResult<Option<Job>> {
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: JobId) -> AppResult<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete(id).await
    }

    async fn record_run(
        &self,
        id: JobId,
        status: JobStatus,
        last_run: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        self.inner.record_run(id, status, last_run).await
    }

    async fn set_next_run(&self, id: JobId, next_run: Option<DateTime<Utc>>) -> AppResult<()> {
        self.inner.set_next_run(id, next_run).await
    }

    async fn set_status(&self, id: JobId, status: JobStatus) -> AppResult<()> {
        self.inner.set_status(id, status).await
    }

    async fn append_log(&self, entry: NewExecutionLog) -> AppResult<ExecutionLog> {
        self.inner.append_log(entry).await
    }

    async fn finish_log(
        &self,
        id: ExecutionLogId,
        completion: LogCompletion,
    ) -> AppResult<ExecutionLog> {
        self.inner.finish_log(id, completion).await
    }

    async fn list_logs(
        &self,
        job_id: JobId,
        page: &PageRequest,
    ) -> AppResult<PageResponse<ExecutionLog>> {
        self.inner.list_logs(job_id, page).await
    }

    async fn counts(&self) -> AppResult<JobCounts> {
        self.inner.counts().await
    }
}

/// Scheduler wired to an in-memory store and recording handlers.
pub struct TestApp {
    pub store: Arc<MemoryJobStore>,
    pub executor: Arc<Executor>,
    pub scheduler: Scheduler,
    pub service: JobService,
    pub clock: Clock,
    pub recorder: Arc<RecorderState>,
    pub owner: UserId,
}

impl TestApp {
    /// Recording handlers for every job type, default settings.
    pub async fn new() -> Self {
        Self::build(&JobType::ALL, test_config(), None).await
    }

    /// Recording handlers for every job type with custom settings.
    pub async fn with_config(config: SchedulerConfig) -> Self {
        Self::build(&JobType::ALL, config, None).await
    }

    /// Recording handlers for the given types only.
    pub async fn with_types(types: &[JobType]) -> Self {
        Self::build(types, test_config(), None).await
    }

    /// Default settings over a store whose deletes take `delay`.
    pub async fn with_slow_delete(delay: Duration) -> Self {
        Self::build(&JobType::ALL, test_config(), Some(delay)).await
    }

    async fn build(types: &[JobType], config: SchedulerConfig, delete_delay: Option<Duration>) -> Self {
        let clock = Clock::starting_at(start_time());
        let recorder = Arc::new(RecorderState::default());

        let mut registry = TaskRegistry::new();
        for job_type in types {
            registry.register(Arc::new(RecordingHandler {
                job_type: *job_type,
                state: Arc::clone(&recorder),
            }));
        }

        let store = Arc::new(MemoryJobStore::new(clock));
        let dyn_store: Arc<dyn JobStore> = match delete_delay {
            Some(delay) => Arc::new(SlowDeleteStore {
                inner: Arc::clone(&store),
                delay,
            }),
            None => store.clone(),
        };
        let executor = Arc::new(Executor::new(
            Arc::clone(&dyn_store),
            Arc::new(registry),
            clock,
            &config,
        ));
        let scheduler = Scheduler::new(Arc::clone(&dyn_store), Arc::clone(&executor), clock, &config);
        scheduler.start().await.expect("scheduler starts");
        let service = JobService::new(dyn_store, Arc::clone(&executor), scheduler.clone(), clock);

        Self {
            store,
            executor,
            scheduler,
            service,
            clock,
            recorder,
            owner: UserId::new(),
        }
    }

    /// Create a webhook-typed job through the service.
    pub async fn create_job(&self, name: &str, schedule: Option<&str>, config: Value) -> Job {
        self.service
            .create(CreateJob {
                owner_id: self.owner,
                name: name.to_string(),
                job_type: "webhook".to_string(),
                schedule: schedule.map(str::to_string),
                config,
                is_active: true,
            })
            .await
            .expect("job is created")
    }

    /// Insert a job straight into the store, bypassing validation.
    pub async fn insert_raw(&self, job_type: JobType, schedule: Option<&str>) -> Job {
        let now = self.clock.now();
        self.store
            .create(Job {
                id: JobId::new(),
                owner_id: self.owner,
                name: format!("raw {job_type}"),
                job_type,
                schedule: schedule.map(str::to_string),
                config: json!({}),
                last_run: None,
                next_run: None,
                status: JobStatus::Active,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("job is inserted")
    }

    /// Reload a job.
    pub async fn job(&self, id: JobId) -> Job {
        self.service.get(id).await.expect("job exists")
    }

    /// Every log entry of a job, newest first.
    pub async fn logs(&self, id: JobId) -> Vec<ExecutionLog> {
        self.service
            .list_logs(id, &PageRequest::new(1, 100))
            .await
            .expect("logs are listed")
            .items
    }

    /// Advance the paused clock until it reads `target`.
    pub async fn advance_to(&self, target: DateTime<Utc>) {
        tokio::time::sleep_until(self.clock.instant_at(target)).await;
    }
}

pub fn test_config() -> SchedulerConfig {
    SchedulerConfig {
        enabled: true,
        handler_timeout_seconds: 60,
        max_concurrent_executions: 4,
        sync_interval_seconds: 30,
        shutdown_grace_seconds: 5,
    }
}
