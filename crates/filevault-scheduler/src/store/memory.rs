//! In-process [`JobStore`] used by tests and dry runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use filevault_core::error::AppError;
use filevault_core::result::AppResult;
use filevault_core::types::id::{ExecutionLogId, JobId};
use filevault_core::types::pagination::{PageRequest, PageResponse};
use filevault_entity::job::log::{ExecutionLog, LogCompletion, LogStatus, NewExecutionLog};
use filevault_entity::job::model::{Job, JobCounts, JobFilter, UpdateJob};
use filevault_entity::job::status::JobStatus;

use super::JobStore;
use crate::clock::Clock;

#[derive(Debug, Default)]
struct State {
    /// Jobs keyed by ID, with their insertion sequence for stable ordering.
    jobs: HashMap<JobId, (u64, Job)>,
    /// Every log entry in append order.
    logs: Vec<ExecutionLog>,
    next_seq: u64,
}

/// Job store held entirely in memory.
#[derive(Debug)]
pub struct MemoryJobStore {
    state: RwLock<State>,
    clock: Clock,
}

impl MemoryJobStore {
    /// Create an empty store stamping `updated_at` from `clock`.
    pub fn new(clock: Clock) -> Self {
        Self {
            state: RwLock::new(State::default()),
            clock,
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new(Clock::system())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: Job) -> AppResult<Job> {
        let mut state = self.state.write().await;
        if state.jobs.contains_key(&job.id) {
            return Err(AppError::conflict(format!("Job {} already exists", job.id)));
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.jobs.insert(job.id, (seq, job.clone()));
        Ok(job)
    }

    async fn get(&self, id: JobId) -> AppResult<Option<Job>> {
        Ok(self.state.read().await.jobs.get(&id).map(|(_, job)| job.clone()))
    }

    async fn list(&self, filter: &JobFilter) -> AppResult<Vec<Job>> {
        let state = self.state.read().await;
        let mut matching: Vec<&(u64, Job)> = state
            .jobs
            .values()
            .filter(|(_, job)| filter.matches(job))
            .collect();
        matching.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at.cmp(&a.created_at).then(b_seq.cmp(a_seq))
        });
        Ok(matching.into_iter().map(|(_, job)| job.clone()).collect())
    }

    async fn update(&self, id: JobId, patch: &UpdateJob) -> AppResult<Option<Job>> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        Ok(state.jobs.get_mut(&id).map(|(_, job)| {
            patch.apply_to(job);
            job.updated_at = now;
            job.clone()
        }))
    }

    async fn delete(&self, id: JobId) -> AppResult<bool> {
        Ok(self.state.write().await.jobs.remove(&id).is_some())
    }

    async fn record_run(
        &self,
        id: JobId,
        status: JobStatus,
        last_run: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        Ok(state.jobs.get_mut(&id).map(|(_, job)| {
            job.status = status;
            job.last_run = Some(last_run);
            job.updated_at = now;
            job.clone()
        }))
    }

    async fn set_next_run(&self, id: JobId, next_run: Option<DateTime<Utc>>) -> AppResult<()> {
        if let Some((_, job)) = self.state.write().await.jobs.get_mut(&id) {
            job.next_run = next_run;
        }
        Ok(())
    }

    async fn set_status(&self, id: JobId, status: JobStatus) -> AppResult<()> {
        let now = self.clock.now();
        if let Some((_, job)) = self.state.write().await.jobs.get_mut(&id) {
            job.status = status;
            job.updated_at = now;
        }
        Ok(())
    }

    async fn append_log(&self, entry: NewExecutionLog) -> AppResult<ExecutionLog> {
        let log = ExecutionLog {
            id: ExecutionLogId::new(),
            job_id: entry.job_id,
            status: LogStatus::Started,
            message: entry.message,
            started_at: entry.started_at,
            completed_at: None,
        };
        self.state.write().await.logs.push(log.clone());
        Ok(log)
    }

    async fn finish_log(
        &self,
        id: ExecutionLogId,
        completion: LogCompletion,
    ) -> AppResult<ExecutionLog> {
        let mut state = self.state.write().await;
        let log = state
            .logs
            .iter_mut()
            .find(|log| log.id == id)
            .ok_or_else(|| AppError::not_found(format!("Execution log not found: {id}")))?;

        if log.status.is_terminal() {
            return Err(AppError::conflict(format!(
                "Execution log {id} is already {}",
                log.status
            )));
        }

        log.status = completion.status;
        log.message = completion.message;
        log.completed_at = Some(completion.completed_at);
        Ok(log.clone())
    }

    async fn list_logs(
        &self,
        job_id: JobId,
        page: &PageRequest,
    ) -> AppResult<PageResponse<ExecutionLog>> {
        let state = self.state.read().await;
        let newest_first: Vec<ExecutionLog> = state
            .logs
            .iter()
            .rev()
            .filter(|log| log.job_id == job_id)
            .cloned()
            .collect();
        Ok(PageResponse::from_ordered(newest_first, page))
    }

    async fn counts(&self) -> AppResult<JobCounts> {
        let state = self.state.read().await;
        let mut counts = JobCounts::default();
        for (_, job) in state.jobs.values() {
            counts.total += 1;
            if job.is_active {
                counts.active += 1;
            }
            if job.status == JobStatus::Failed {
                counts.failed += 1;
            }
        }
        Ok(counts)
    }
}
