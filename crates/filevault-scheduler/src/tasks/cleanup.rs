//! Retention cleanup: purges expired soft-deleted files and share links.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;
use serde_json::{Value, json};

use filevault_core::traits::FileMaintenance;
use filevault_entity::job::status::JobType;

use super::integer_option;
use crate::registry::{TaskContext, TaskError, TaskHandler};

/// Retention applied when the job config does not set `retentionDays`.
const DEFAULT_RETENTION_DAYS: u64 = 30;

/// Handles `cleanup` jobs
#[derive(Debug)]
pub struct CleanupTask {
    maintenance: Arc<dyn FileMaintenance>,
}

impl CleanupTask {
    /// Create a new cleanup task
    pub fn new(maintenance: Arc<dyn FileMaintenance>) -> Self {
        Self { maintenance }
    }
}

#[async_trait]
impl TaskHandler for CleanupTask {
    fn job_type(&self) -> JobType {
        JobType::Cleanup
    }

    async fn execute(&self, ctx: TaskContext) -> Result<Option<Value>, TaskError> {
        let retention_days =
            integer_option(&ctx.config, "retentionDays")?.unwrap_or(DEFAULT_RETENTION_DAYS);
        if retention_days == 0 {
            return Err(TaskError::InvalidConfig(
                "'retentionDays' must be at least 1".to_string(),
            ));
        }
        let retention = i64::try_from(retention_days)
            .ok()
            .and_then(TimeDelta::try_days)
            .ok_or_else(|| TaskError::InvalidConfig("'retentionDays' is too large".to_string()))?;
        let cutoff = ctx.started_at - retention;

        tracing::info!("Running cleanup with retention of {} days", retention_days);

        let purged_files = self.maintenance.purge_soft_deleted(cutoff).await?;
        let deactivated_shares = self
            .maintenance
            .deactivate_expired_shares(ctx.started_at)
            .await?;

        tracing::info!(
            "Purged {} files, deactivated {} expired shares",
            purged_files,
            deactivated_shares
        );

        Ok(Some(json!({
            "purged_files": purged_files,
            "deactivated_shares": deactivated_shares,
            "retention_days": retention_days,
        })))
    }
}
