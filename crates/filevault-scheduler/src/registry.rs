//! Task registry: dispatches jobs to the handler for their type.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use filevault_core::error::AppError;
use filevault_core::types::id::{JobId, UserId};
use filevault_entity::job::status::JobType;

/// Everything a handler gets to see about the run it performs.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// The job being run.
    pub job_id: JobId,
    /// Display name of the job.
    pub job_name: String,
    /// Owner of the job.
    pub owner_id: UserId,
    /// The job's handler configuration.
    pub config: Value,
    /// When this run started.
    pub started_at: DateTime<Utc>,
}

/// Error returned by a task handler.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The task ran and failed.
    #[error("{0}")]
    Failed(String),

    /// The job config is unusable for this handler.
    #[error("Invalid job config: {0}")]
    InvalidConfig(String),

    /// A collaborator failed.
    #[error(transparent)]
    Internal(#[from] AppError),
}

/// Trait for task handler implementations
#[async_trait]
pub trait TaskHandler: Send + Sync + std::fmt::Debug + 'static {
    /// The job type this handler runs
    fn job_type(&self) -> JobType;

    /// Run the task. The optional value is a JSON summary of the work done.
    async fn execute(&self, ctx: TaskContext) -> Result<Option<Value>, TaskError>;

    /// Time budget overriding the scheduler default
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// Closed mapping from job type to handler
#[derive(Debug, Default)]
pub struct TaskRegistry {
    handlers: HashMap<JobType, Arc<dyn TaskHandler>>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the same type
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        let job_type = handler.job_type();
        tracing::info!("Registered task handler for type '{}'", job_type);
        self.handlers.insert(job_type, handler);
    }

    /// Look up the handler for a type
    pub fn get(&self, job_type: JobType) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(&job_type).cloned()
    }

    /// Check if a handler is registered for a type
    pub fn contains(&self, job_type: JobType) -> bool {
        self.handlers.contains_key(&job_type)
    }

    /// Registered types in declaration order
    pub fn registered_types(&self) -> Vec<JobType> {
        JobType::ALL
            .into_iter()
            .filter(|t| self.handlers.contains_key(t))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Noop(JobType);

    #[async_trait]
    impl TaskHandler for Noop {
        fn job_type(&self) -> JobType {
            self.0
        }

        async fn execute(&self, _ctx: TaskContext) -> Result<Option<Value>, TaskError> {
            Ok(None)
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = TaskRegistry::new();
        registry.register(Arc::new(Noop(JobType::Webhook)));
        registry.register(Arc::new(Noop(JobType::Backup)));

        assert!(registry.contains(JobType::Webhook));
        assert!(registry.get(JobType::Cleanup).is_none());
        assert_eq!(
            registry.registered_types(),
            vec![JobType::Backup, JobType::Webhook]
        );
        assert_eq!(
            registry.get(JobType::Backup).map(|h| h.job_type()),
            Some(JobType::Backup)
        );
    }
}
