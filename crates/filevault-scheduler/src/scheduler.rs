//! Scheduler core: keeps exactly one timer per active scheduled job.
//!
//! Each armed job owns a driver task that sleeps until the next fire time,
//! hands the job to the [`Executor`], and re-arms once the run is over.
//! Every mutation of the timer map happens while holding that job's entry
//! in the lock table, and every timer carries a generation number so a
//! replaced timer can never act again.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use filevault_core::config::SchedulerConfig;
use filevault_core::error::AppError;
use filevault_core::result::AppResult;
use filevault_core::types::id::JobId;
use filevault_entity::job::log::{LogCompletion, LogStatus, NewExecutionLog};
use filevault_entity::job::model::{Job, JobFilter};
use filevault_entity::job::status::JobStatus;

use crate::clock::Clock;
use crate::executor::{Admission, Executor};
use crate::schedule::{Schedule, ScheduleError};
use crate::store::JobStore;

/// Phase of an armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    /// Waiting for the next fire time.
    Armed,
    /// The job is executing; the timer re-arms when it finishes.
    Firing,
}

/// Result of (re)arming a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArmState {
    /// A timer is armed for `next_run`.
    Armed {
        /// Next fire time.
        next_run: DateTime<Utc>,
    },
    /// The job is inactive, unscheduled, or gone.
    Unarmed,
    /// The schedule has no upcoming occurrence.
    Dormant,
    /// The schedule could not be parsed; the job is marked failed.
    Failed {
        /// Parser error.
        reason: String,
    },
}

/// Snapshot of one armed timer.
#[derive(Debug, Clone, Serialize)]
pub struct ArmedJob {
    /// The armed job.
    pub job_id: JobId,
    /// Expression the timer was armed from.
    pub expression: String,
    /// Next fire time.
    pub next_run: DateTime<Utc>,
    /// Current phase.
    pub state: TimerState,
}

/// Exclusive hold on one job's critical section.
#[derive(Debug)]
pub struct JobLock {
    job_id: JobId,
    _guard: OwnedMutexGuard<()>,
}

impl JobLock {
    /// The locked job.
    pub fn job_id(&self) -> JobId {
        self.job_id
    }
}

#[derive(Debug)]
struct ArmedTimer {
    generation: u64,
    expression: String,
    next_run: DateTime<Utc>,
    state: TimerState,
    handle: JoinHandle<()>,
}

enum FireStep {
    Run(Admission),
    Skip,
    Stop,
}

/// Timer map over the job store.
#[derive(Debug, Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    store: Arc<dyn JobStore>,
    executor: Arc<Executor>,
    clock: Clock,
    sync_interval: Duration,
    shutdown_grace: Duration,
    locks: DashMap<JobId, Arc<Mutex<()>>>,
    timers: DashMap<JobId, ArmedTimer>,
    /// Jobs left unarmed because their expression failed or ran out,
    /// keyed to that expression so reconciliation does not retry it.
    dormant: DashMap<JobId, String>,
    generation: AtomicU64,
    stopped: AtomicBool,
    rearm_tx: mpsc::UnboundedSender<JobId>,
    rearm_rx: Mutex<Option<mpsc::UnboundedReceiver<JobId>>>,
    shutdown_tx: watch::Sender<bool>,
    reconciler: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler. Nothing is armed until [`start`](Self::start).
    pub fn new(
        store: Arc<dyn JobStore>,
        executor: Arc<Executor>,
        clock: Clock,
        config: &SchedulerConfig,
    ) -> Self {
        let (rearm_tx, rearm_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                store,
                executor,
                clock,
                sync_interval: config.sync_interval(),
                shutdown_grace: config.shutdown_grace(),
                locks: DashMap::new(),
                timers: DashMap::new(),
                dormant: DashMap::new(),
                generation: AtomicU64::new(0),
                stopped: AtomicBool::new(false),
                rearm_tx,
                rearm_rx: Mutex::new(Some(rearm_rx)),
                shutdown_tx,
                reconciler: Mutex::new(None),
            }),
        }
    }

    /// Arm every active scheduled job and start the reconciliation loop.
    ///
    /// Returns the number of armed timers.
    pub async fn start(&self) -> AppResult<usize> {
        let mut rearm_slot = self.inner.rearm_rx.lock().await;
        if rearm_slot.is_none() {
            return Err(AppError::conflict("Scheduler already started"));
        }

        let armed = self.inner.reconcile().await?;

        let Some(rearm_rx) = rearm_slot.take() else {
            return Err(AppError::conflict("Scheduler already started"));
        };
        let handle = tokio::spawn(run_reconciler(
            Arc::clone(&self.inner),
            self.inner.shutdown_tx.subscribe(),
            rearm_rx,
        ));
        *self.inner.reconciler.lock().await = Some(handle);

        tracing::info!(
            armed,
            sync_interval_secs = self.inner.sync_interval.as_secs(),
            "Scheduler started"
        );
        Ok(armed)
    }

    /// Enter a job's critical section.
    pub async fn lock(&self, job_id: JobId) -> JobLock {
        let mutex = self.inner.lock_for(job_id);
        JobLock {
            job_id,
            _guard: mutex.lock_owned().await,
        }
    }

    /// Disarm and, if the stored job is still active and scheduled, re-arm.
    pub async fn rearm(&self, lock: &JobLock) -> AppResult<ArmState> {
        self.inner.rearm_locked(lock.job_id).await
    }

    /// Remove the job's timer and clear its `next_run`.
    ///
    /// An execution already in flight keeps running; only its re-arm is
    /// prevented. Returns whether a timer was removed.
    pub async fn disarm(&self, lock: &JobLock) -> AppResult<bool> {
        let removed = self.inner.take_timer(lock.job_id);
        self.inner.dormant.remove(&lock.job_id);
        self.inner.store.set_next_run(lock.job_id, None).await?;
        if removed {
            tracing::debug!(job_id = %lock.job_id, "Disarmed job");
        }
        Ok(removed)
    }

    /// Drop all bookkeeping for a deleted job.
    pub fn forget(&self, lock: JobLock) {
        self.inner.take_timer(lock.job_id);
        self.inner.dormant.remove(&lock.job_id);
        self.inner.locks.remove(&lock.job_id);
    }

    /// Disarm-then-arm one job under its lock.
    pub async fn reschedule(&self, job_id: JobId) -> AppResult<ArmState> {
        self.inner.reschedule(job_id).await
    }

    /// Bring the timer map in line with the store.
    ///
    /// Returns the number of armed timers afterwards.
    pub async fn reconcile(&self) -> AppResult<usize> {
        self.inner.reconcile().await
    }

    /// Stop reconciling, disarm every timer, and wait for in-flight
    /// executions up to the grace period.
    ///
    /// Returns `true` if all executions finished in time.
    pub async fn shutdown(&self) -> bool {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.shutdown_tx.send_replace(true);

        if let Some(handle) = self.inner.reconciler.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Reconciliation loop ended abnormally: {}", e);
            }
        }

        let armed: Vec<JobId> = self.inner.timers.iter().map(|entry| *entry.key()).collect();
        for job_id in armed {
            let lock = self.lock(job_id).await;
            if self.inner.take_timer(job_id) {
                if let Err(e) = self.inner.store.set_next_run(job_id, None).await {
                    tracing::warn!(job_id = %job_id, "Failed to clear next run: {}", e);
                }
            }
            drop(lock);
        }

        tracing::info!(
            running = self.inner.executor.running_count(),
            grace_secs = self.inner.shutdown_grace.as_secs(),
            "Timers disarmed, waiting for in-flight executions"
        );
        let drained = self.inner.executor.wait_idle(self.inner.shutdown_grace).await;
        tracing::info!(drained, "Scheduler shut down");
        drained
    }

    /// Whether the job currently has a timer.
    pub fn is_armed(&self, job_id: JobId) -> bool {
        self.inner.timers.contains_key(&job_id)
    }

    /// Whether the job was left unarmed because of its expression.
    pub fn is_dormant(&self, job_id: JobId) -> bool {
        self.inner.dormant.contains_key(&job_id)
    }

    /// Phase of the job's timer, if armed.
    pub fn timer_state(&self, job_id: JobId) -> Option<TimerState> {
        self.inner.timers.get(&job_id).map(|timer| timer.state)
    }

    /// Number of armed timers.
    pub fn armed_count(&self) -> usize {
        self.inner.timers.len()
    }

    /// Snapshot of every armed timer, soonest first.
    pub fn armed_jobs(&self) -> Vec<ArmedJob> {
        let mut jobs: Vec<ArmedJob> = self
            .inner
            .timers
            .iter()
            .map(|entry| ArmedJob {
                job_id: *entry.key(),
                expression: entry.expression.clone(),
                next_run: entry.next_run,
                state: entry.state,
            })
            .collect();
        jobs.sort_by_key(|job| job.next_run);
        jobs
    }
}

impl Inner {
    fn lock_for(&self, job_id: JobId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(job_id).or_default().value())
    }

    /// Remove and abort a timer. Never called from the timer's own driver.
    fn take_timer(&self, job_id: JobId) -> bool {
        match self.timers.remove(&job_id) {
            Some((_, timer)) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    async fn reschedule(self: &Arc<Self>, job_id: JobId) -> AppResult<ArmState> {
        let mutex = self.lock_for(job_id);
        let _guard = mutex.lock().await;
        self.rearm_locked(job_id).await
    }

    /// Caller holds the job lock.
    async fn rearm_locked(self: &Arc<Self>, job_id: JobId) -> AppResult<ArmState> {
        self.take_timer(job_id);
        if self.stopped.load(Ordering::SeqCst) {
            return Ok(ArmState::Unarmed);
        }

        let Some(job) = self.store.get(job_id).await? else {
            self.dormant.remove(&job_id);
            return Ok(ArmState::Unarmed);
        };

        if !job.is_schedulable() {
            self.dormant.remove(&job_id);
            if job.next_run.is_some() {
                self.store.set_next_run(job_id, None).await?;
            }
            return Ok(ArmState::Unarmed);
        }

        self.arm_locked(&job).await
    }

    /// Caller holds the job lock and has removed any previous timer.
    async fn arm_locked(self: &Arc<Self>, job: &Job) -> AppResult<ArmState> {
        let Some(expression) = job.schedule.clone() else {
            return Ok(ArmState::Unarmed);
        };

        let now = self.clock.now();
        let base = job.last_run.map_or(now, |last| last.max(now));
        let parsed = Schedule::parse(&expression).and_then(|schedule| {
            let next_run = schedule.next_fire_time(base)?;
            Ok((schedule, next_run))
        });

        match parsed {
            Ok((schedule, next_run)) => {
                self.dormant.remove(&job.id);
                self.store.set_next_run(job.id, Some(next_run)).await?;

                let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
                let handle = tokio::spawn(drive(
                    Arc::clone(self),
                    job.id,
                    generation,
                    schedule,
                    next_run,
                ));
                self.timers.insert(
                    job.id,
                    ArmedTimer {
                        generation,
                        expression,
                        next_run,
                        state: TimerState::Armed,
                        handle,
                    },
                );

                tracing::debug!(job_id = %job.id, next_run = %next_run, generation, "Armed job");
                Ok(ArmState::Armed { next_run })
            }
            Err(ScheduleError::NoUpcomingOccurrence { .. }) => {
                tracing::info!(
                    job_id = %job.id,
                    schedule = %expression,
                    "Schedule has no upcoming occurrence, leaving job unarmed"
                );
                self.dormant.insert(job.id, expression);
                if job.next_run.is_some() {
                    self.store.set_next_run(job.id, None).await?;
                }
                Ok(ArmState::Dormant)
            }
            Err(err) => {
                let reason = err.to_string();
                self.record_arm_failure(job, expression, &reason).await?;
                Ok(ArmState::Failed { reason })
            }
        }
    }

    async fn record_arm_failure(&self, job: &Job, expression: String, reason: &str) -> AppResult<()> {
        tracing::error!(job_id = %job.id, schedule = %expression, "Failed to arm job: {}", reason);
        self.dormant.insert(job.id, expression);

        self.store.set_status(job.id, JobStatus::Failed).await?;
        self.store.set_next_run(job.id, None).await?;

        let now = self.clock.now();
        let entry = self
            .store
            .append_log(NewExecutionLog {
                job_id: job.id,
                message: format!("Job {} could not be scheduled", job.name),
                started_at: now,
            })
            .await?;
        self.store
            .finish_log(
                entry.id,
                LogCompletion {
                    status: LogStatus::Failed,
                    message: format!("Job {} failed: {}", job.name, reason),
                    completed_at: now,
                },
            )
            .await?;
        Ok(())
    }

    /// Timer fired: mark it firing, load the current job definition, and
    /// admit it while the job lock is held.
    async fn begin_fire(&self, job_id: JobId, generation: u64) -> FireStep {
        let mutex = self.lock_for(job_id);
        let _guard = mutex.lock().await;

        let expression = match self.timers.get_mut(&job_id) {
            Some(mut timer) if timer.generation == generation => {
                timer.state = TimerState::Firing;
                timer.expression.clone()
            }
            _ => return FireStep::Stop,
        };

        match self.store.get(job_id).await {
            Ok(Some(job)) if job.is_schedulable() && job.schedule.as_deref() == Some(expression.as_str()) => {
                match self.executor.admit(job) {
                    Ok(admission) => FireStep::Run(admission),
                    Err(_) => {
                        tracing::debug!(job_id = %job_id, "Previous run still in progress, occurrence skipped");
                        FireStep::Skip
                    }
                }
            }
            Ok(Some(job)) if job.is_schedulable() => {
                tracing::debug!(job_id = %job_id, "Schedule changed since arming, re-arming");
                self.timers.remove(&job_id);
                if self.rearm_tx.send(job_id).is_err() {
                    tracing::warn!(job_id = %job_id, "Re-arm request dropped");
                }
                FireStep::Stop
            }
            Ok(_) => {
                tracing::debug!(job_id = %job_id, "Job no longer schedulable, dropping timer");
                self.timers.remove(&job_id);
                self.dormant.remove(&job_id);
                if let Err(e) = self.store.set_next_run(job_id, None).await {
                    tracing::warn!(job_id = %job_id, "Failed to clear next run: {}", e);
                }
                FireStep::Stop
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, "Failed to load job, skipping occurrence: {}", e);
                FireStep::Skip
            }
        }
    }

    /// Run the admitted job in its own task and wait for it.
    async fn execute(&self, admission: Admission) {
        let job_id = admission.job().id;
        let executor = Arc::clone(&self.executor);
        let run = tokio::spawn(async move { executor.execute(admission).await });

        match run.await {
            Ok(Ok(report)) => {
                tracing::debug!(job_id = %job_id, status = ?report.status, "Scheduled run finished")
            }
            Ok(Err(e)) => tracing::debug!(job_id = %job_id, "Scheduled run failed: {}", e),
            Err(e) => tracing::error!(job_id = %job_id, "Execution task failed: {}", e),
        }
    }

    /// Run finished: compute and persist the next fire time.
    ///
    /// Returns `None` when the timer was replaced or removed meanwhile, or
    /// when the schedule is exhausted.
    async fn complete_fire(
        &self,
        job_id: JobId,
        generation: u64,
        schedule: &Schedule,
        fired_at: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let mutex = self.lock_for(job_id);
        let _guard = mutex.lock().await;

        let current = self
            .timers
            .get(&job_id)
            .is_some_and(|timer| timer.generation == generation);
        if !current {
            tracing::debug!(job_id = %job_id, "Job disarmed while firing, not re-arming");
            return None;
        }

        // Occurrences missed during a long run are coalesced into the next one.
        let base = fired_at.max(self.clock.now());
        match schedule.next_fire_time(base) {
            Ok(next_run) => {
                if let Some(mut timer) = self.timers.get_mut(&job_id) {
                    timer.state = TimerState::Armed;
                    timer.next_run = next_run;
                }
                if let Err(e) = self.store.set_next_run(job_id, Some(next_run)).await {
                    tracing::error!(job_id = %job_id, "Failed to persist next run: {}", e);
                }
                tracing::debug!(job_id = %job_id, next_run = %next_run, "Re-armed job");
                Some(next_run)
            }
            Err(e) => {
                self.timers.remove(&job_id);
                self.dormant.insert(job_id, schedule.expression().to_string());
                if let Err(e) = self.store.set_next_run(job_id, None).await {
                    tracing::error!(job_id = %job_id, "Failed to clear next run: {}", e);
                }
                tracing::info!(job_id = %job_id, "Job unarmed: {}", e);
                None
            }
        }
    }

    async fn reconcile(self: &Arc<Self>) -> AppResult<usize> {
        let wanted: HashMap<JobId, String> = self
            .store
            .list(&JobFilter::schedulable())
            .await?
            .into_iter()
            .filter_map(|job| {
                let id = job.id;
                job.schedule.map(|schedule| (id, schedule))
            })
            .collect();

        let armed: Vec<(JobId, String)> = self
            .timers
            .iter()
            .map(|entry| (*entry.key(), entry.expression.clone()))
            .collect();
        let armed_ids: HashSet<JobId> = armed.iter().map(|(id, _)| *id).collect();

        let mut stale: Vec<JobId> = armed
            .iter()
            .filter(|(id, expression)| wanted.get(id) != Some(expression))
            .map(|(id, _)| *id)
            .collect();

        for (id, expression) in &wanted {
            if armed_ids.contains(id) {
                continue;
            }
            let settled = self
                .dormant
                .get(id)
                .is_some_and(|dormant| dormant.value() == expression);
            if !settled {
                stale.push(*id);
            }
        }

        self.dormant.retain(|id, _| wanted.contains_key(id));

        for job_id in stale {
            if let Err(e) = self.reschedule(job_id).await {
                tracing::warn!(job_id = %job_id, "Failed to reconcile job: {}", e);
            }
        }

        Ok(self.timers.len())
    }
}

/// Timer loop for one armed job.
async fn drive(
    inner: Arc<Inner>,
    job_id: JobId,
    generation: u64,
    schedule: Schedule,
    mut fire_at: DateTime<Utc>,
) {
    loop {
        inner.clock.sleep_until(fire_at, inner.sync_interval).await;

        match inner.begin_fire(job_id, generation).await {
            FireStep::Run(admission) => inner.execute(admission).await,
            FireStep::Skip => {}
            FireStep::Stop => return,
        }

        match inner.complete_fire(job_id, generation, &schedule, fire_at).await {
            Some(next_run) => fire_at = next_run,
            None => return,
        }
    }
}

async fn run_reconciler(
    inner: Arc<Inner>,
    mut shutdown: watch::Receiver<bool>,
    mut rearm_rx: mpsc::UnboundedReceiver<JobId>,
) {
    let mut ticker = tokio::time::interval(inner.sync_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::debug!("Reconciliation loop stopping");
                    break;
                }
            }
            Some(job_id) = rearm_rx.recv() => {
                if let Err(e) = inner.reschedule(job_id).await {
                    tracing::warn!(job_id = %job_id, "Failed to re-arm job: {}", e);
                }
            }
            _ = ticker.tick() => {
                match inner.reconcile().await {
                    Ok(armed) => tracing::debug!(armed, "Reconciled timers with job store"),
                    Err(e) => tracing::warn!("Reconciliation failed: {}", e),
                }
            }
        }
    }
}
