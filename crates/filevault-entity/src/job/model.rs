//! Job entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use validator::Validate;

use filevault_core::types::id::{JobId, UserId};

use super::status::{JobStatus, JobType, UnknownJobType};

/// A named, typed, optionally recurring unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Principal that owns the job.
    pub owner_id: UserId,
    /// Human-readable label.
    pub name: String,
    /// Task type; selects the handler.
    pub job_type: JobType,
    /// Recurrence expression. `None` means the job only runs on demand.
    pub schedule: Option<String>,
    /// Handler-specific configuration (JSON object).
    pub config: serde_json::Value,
    /// When the job last started running.
    pub last_run: Option<DateTime<Utc>>,
    /// When the armed timer will next fire.
    pub next_run: Option<DateTime<Utc>>,
    /// Last known run state.
    pub status: JobStatus,
    /// Inactive jobs are never armed.
    pub is_active: bool,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job definition was last changed.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Whether the scheduler should keep a timer for this job.
    pub fn is_schedulable(&self) -> bool {
        self.is_active && self.schedule.is_some()
    }
}

/// Data required to create a new job.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateJob {
    /// Owning principal.
    pub owner_id: UserId,
    /// Human-readable label.
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    /// Task type as supplied by the caller, e.g. `"cleanup"`.
    pub job_type: String,
    /// Recurrence expression.
    #[validate(length(min = 1, max = 255))]
    pub schedule: Option<String>,
    /// Handler configuration.
    #[serde(default = "empty_config")]
    pub config: serde_json::Value,
    /// Whether the job starts armed.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl CreateJob {
    /// Parse the requested task type.
    pub fn parsed_type(&self) -> Result<JobType, UnknownJobType> {
        self.job_type.trim().parse()
    }
}

/// A partial update of the mutable job fields.
///
/// `schedule` distinguishes "leave unchanged" (`None`) from "clear"
/// (`Some(None)`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateJob {
    /// New label.
    #[validate(length(min = 1, max = 255))]
    #[serde(default)]
    pub name: Option<String>,
    /// New recurrence expression, or `Some(None)` to remove it.
    #[serde(default, deserialize_with = "present")]
    pub schedule: Option<Option<String>>,
    /// New handler configuration.
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    /// New active flag.
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl UpdateJob {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.schedule.is_none()
            && self.config.is_none()
            && self.is_active.is_none()
    }

    /// Whether the patch affects when (or whether) the job is armed.
    pub fn touches_schedule(&self) -> bool {
        self.schedule.is_some() || self.is_active.is_some()
    }

    /// Apply the patch to a job in place.
    pub fn apply_to(&self, job: &mut Job) {
        if let Some(name) = &self.name {
            job.name = name.clone();
        }
        if let Some(schedule) = &self.schedule {
            job.schedule = schedule.clone();
        }
        if let Some(config) = &self.config {
            job.config = config.clone();
        }
        if let Some(is_active) = self.is_active {
            job.is_active = is_active;
            job.status = if is_active {
                JobStatus::Active
            } else {
                JobStatus::Paused
            };
        }
    }
}

/// Aggregate job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct JobCounts {
    /// All job definitions.
    pub total: i64,
    /// Jobs with `is_active = true`.
    pub active: i64,
    /// Jobs whose most recent run or arm attempt failed.
    pub failed: i64,
}

/// Criteria for listing jobs. Unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobFilter {
    /// Only jobs owned by this principal.
    pub owner_id: Option<UserId>,
    /// Only jobs of this type.
    pub job_type: Option<JobType>,
    /// Only jobs with this active flag.
    pub is_active: Option<bool>,
}

impl JobFilter {
    /// Filter matching active jobs that carry a schedule expression.
    pub fn schedulable() -> Self {
        Self {
            is_active: Some(true),
            ..Self::default()
        }
    }

    /// Whether a job satisfies this filter.
    pub fn matches(&self, job: &Job) -> bool {
        self.owner_id.is_none_or(|owner| job.owner_id == owner)
            && self.job_type.is_none_or(|t| job.job_type == t)
            && self.is_active.is_none_or(|active| job.is_active == active)
    }
}

fn empty_config() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn default_active() -> bool {
    true
}

/// Maps a present JSON field (including `null`) to `Some(..)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> Job {
        let now = Utc::now();
        Job {
            id: JobId::new(),
            owner_id: UserId::new(),
            name: "nightly cleanup".to_string(),
            job_type: JobType::Cleanup,
            schedule: Some("0 3 * * *".to_string()),
            config: serde_json::json!({"retentionDays": 30}),
            last_run: None,
            next_run: None,
            status: JobStatus::Active,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_update_distinguishes_missing_from_null_schedule() {
        let untouched: UpdateJob = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert_eq!(untouched.schedule, None);
        assert!(!untouched.touches_schedule());

        let cleared: UpdateJob = serde_json::from_str(r#"{"schedule": null}"#).unwrap();
        assert_eq!(cleared.schedule, Some(None));
        assert!(cleared.touches_schedule());
    }

    #[test]
    fn test_deactivating_pauses() {
        let mut job = sample_job();
        let patch = UpdateJob {
            is_active: Some(false),
            ..UpdateJob::default()
        };
        patch.apply_to(&mut job);

        assert!(!job.is_active);
        assert_eq!(job.status, JobStatus::Paused);
        assert!(!job.is_schedulable());
    }

    #[test]
    fn test_empty_patch() {
        assert!(UpdateJob::default().is_empty());
    }

    #[test]
    fn test_filter_matches() {
        let job = sample_job();
        assert!(JobFilter::default().matches(&job));
        assert!(JobFilter::schedulable().matches(&job));

        let other_owner = JobFilter {
            owner_id: Some(UserId::new()),
            ..JobFilter::default()
        };
        assert!(!other_owner.matches(&job));

        let webhooks = JobFilter {
            job_type: Some(JobType::Webhook),
            ..JobFilter::default()
        };
        assert!(!webhooks.matches(&job));
    }

    #[test]
    fn test_create_job_validation() {
        let create = CreateJob {
            owner_id: UserId::new(),
            name: String::new(),
            job_type: "backup".to_string(),
            schedule: None,
            config: empty_config(),
            is_active: true,
        };
        assert!(create.validate().is_err());
    }

    #[test]
    fn test_create_job_type_parsing() {
        let mut create: CreateJob = serde_json::from_value(serde_json::json!({
            "owner_id": UserId::new(),
            "name": "scan uploads",
            "job_type": "virus_scan",
        }))
        .unwrap();
        assert_eq!(create.parsed_type().unwrap(), JobType::VirusScan);
        assert!(create.is_active);
        assert_eq!(create.config, serde_json::json!({}));

        create.job_type = "defrag".to_string();
        assert_eq!(
            create.parsed_type().unwrap_err(),
            UnknownJobType("defrag".to_string())
        );
    }
}
