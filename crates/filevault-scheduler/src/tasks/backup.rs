//! Backup of selected paths to the configured destination.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Value, json};

use filevault_core::traits::RemoteBackup;
use filevault_entity::job::status::JobType;

use super::{PATH_CONCURRENCY, string_list};
use crate::registry::{TaskContext, TaskError, TaskHandler};

/// Handles `backup` jobs
#[derive(Debug)]
pub struct BackupTask {
    backup: Arc<dyn RemoteBackup>,
}

impl BackupTask {
    /// Create a new backup task
    pub fn new(backup: Arc<dyn RemoteBackup>) -> Self {
        Self { backup }
    }
}

#[async_trait]
impl TaskHandler for BackupTask {
    fn job_type(&self) -> JobType {
        JobType::Backup
    }

    async fn execute(&self, ctx: TaskContext) -> Result<Option<Value>, TaskError> {
        let paths = string_list(&ctx.config, "paths")?;
        if paths.is_empty() {
            return Err(TaskError::InvalidConfig(
                "'paths' must list at least one path".to_string(),
            ));
        }

        let destination = self.backup.destination().to_string();
        tracing::info!("Backing up {} paths to {}", paths.len(), destination);

        let results: Vec<(String, _)> = futures::stream::iter(paths)
            .map(|path| async move {
                let result = self.backup.copy_to_remote(&path).await;
                (path, result)
            })
            .buffered(PATH_CONCURRENCY)
            .collect()
            .await;

        let mut copied = 0usize;
        let mut failed = Vec::new();
        for (path, result) in results {
            match result {
                Ok(()) => copied += 1,
                Err(e) => {
                    tracing::warn!("Backup of '{}' failed: {}", path, e);
                    failed.push(path);
                }
            }
        }

        if !failed.is_empty() {
            return Err(TaskError::Failed(format!(
                "Backup failed for {} of {} paths: {}",
                failed.len(),
                copied + failed.len(),
                failed.join(", ")
            )));
        }

        Ok(Some(json!({
            "destination": destination,
            "copied": copied,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use filevault_core::error::AppError;
    use filevault_core::result::AppResult;
    use filevault_core::types::id::{JobId, UserId};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct FakeBackup {
        copied: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RemoteBackup for FakeBackup {
        fn destination(&self) -> &str {
            "fake"
        }

        async fn copy_to_remote(&self, local_ref: &str) -> AppResult<()> {
            if local_ref.starts_with("missing") {
                return Err(AppError::storage(format!("No such object: {local_ref}")));
            }
            self.copied.lock().unwrap().push(local_ref.to_string());
            Ok(())
        }
    }

    fn ctx(config: Value) -> TaskContext {
        TaskContext {
            job_id: JobId::new(),
            job_name: "nightly backup".to_string(),
            owner_id: UserId::new(),
            config,
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_copies_every_path() {
        let backup = Arc::new(FakeBackup::default());
        let task = BackupTask::new(backup.clone());

        let summary = task
            .execute(ctx(json!({"paths": ["docs/a.txt", "photos"]})))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(summary, json!({"destination": "fake", "copied": 2}));
        assert_eq!(backup.copied.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_lists_failed_paths() {
        let backup = Arc::new(FakeBackup::default());
        let task = BackupTask::new(backup.clone());

        let err = task
            .execute(ctx(json!({"paths": ["ok.txt", "missing/one", "missing/two"]})))
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("2 of 3"));
        assert!(message.contains("missing/one, missing/two"));
        assert_eq!(*backup.copied.lock().unwrap(), vec!["ok.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_requires_paths() {
        let task = BackupTask::new(Arc::new(FakeBackup::default()));
        for config in [json!({}), json!({"paths": []}), json!({"paths": "a.txt"})] {
            let err = task.execute(ctx(config)).await.unwrap_err();
            assert!(matches!(err, TaskError::InvalidConfig(_)));
        }
    }
}
