//! Duplicate detection over file content checksums.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use filevault_core::traits::ChecksumIndex;
use filevault_entity::job::status::JobType;

use super::integer_option;
use crate::registry::{TaskContext, TaskError, TaskHandler};

const DEFAULT_MIN_SET_SIZE: u64 = 2;

/// Handles `duplicate_detection` jobs
#[derive(Debug)]
pub struct DuplicateDetectionTask {
    checksums: Arc<dyn ChecksumIndex>,
}

impl DuplicateDetectionTask {
    /// Create a new duplicate detection task
    pub fn new(checksums: Arc<dyn ChecksumIndex>) -> Self {
        Self { checksums }
    }
}

#[async_trait]
impl TaskHandler for DuplicateDetectionTask {
    fn job_type(&self) -> JobType {
        JobType::DuplicateDetection
    }

    async fn execute(&self, ctx: TaskContext) -> Result<Option<Value>, TaskError> {
        let min_set_size =
            integer_option(&ctx.config, "minSetSize")?.unwrap_or(DEFAULT_MIN_SET_SIZE);
        if min_set_size < 2 {
            return Err(TaskError::InvalidConfig(
                "'minSetSize' must be at least 2".to_string(),
            ));
        }

        let sets: Vec<_> = self
            .checksums
            .group_by_checksum()
            .await?
            .into_iter()
            .filter(|set| set.file_ids.len() as u64 >= min_set_size)
            .collect();

        let duplicate_files: usize = sets.iter().map(|set| set.file_ids.len()).sum();
        tracing::info!(
            "Found {} duplicate sets covering {} files",
            sets.len(),
            duplicate_files
        );

        Ok(Some(json!({
            "duplicate_sets": sets.len(),
            "duplicate_files": duplicate_files,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use filevault_core::result::AppResult;
    use filevault_core::traits::DuplicateSet;
    use filevault_core::types::id::{FileId, JobId, UserId};

    #[derive(Debug)]
    struct FakeIndex(Vec<DuplicateSet>);

    #[async_trait]
    impl ChecksumIndex for FakeIndex {
        async fn group_by_checksum(&self) -> AppResult<Vec<DuplicateSet>> {
            Ok(self.0.clone())
        }
    }

    fn set(checksum: &str, files: usize) -> DuplicateSet {
        DuplicateSet {
            checksum: checksum.to_string(),
            file_ids: (0..files).map(|_| FileId::new()).collect(),
        }
    }

    fn ctx(config: Value) -> TaskContext {
        TaskContext {
            job_id: JobId::new(),
            job_name: "dedupe".to_string(),
            owner_id: UserId::new(),
            config,
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_reports_sets_and_files() {
        let task = DuplicateDetectionTask::new(Arc::new(FakeIndex(vec![
            set("aa", 2),
            set("bb", 3),
        ])));

        let summary = task.execute(ctx(json!({}))).await.unwrap().unwrap();
        assert_eq!(summary, json!({"duplicate_sets": 2, "duplicate_files": 5}));

        let summary = task
            .execute(ctx(json!({"minSetSize": 3})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary, json!({"duplicate_sets": 1, "duplicate_files": 3}));
    }

    #[tokio::test]
    async fn test_min_set_size_below_two_is_invalid() {
        let task = DuplicateDetectionTask::new(Arc::new(FakeIndex(Vec::new())));
        let err = task
            .execute(ctx(json!({"minSetSize": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidConfig(_)));
    }
}
