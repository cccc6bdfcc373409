//! Scheduler error taxonomy.

use std::time::Duration;

use filevault_core::error::{AppError, ErrorKind};
use filevault_core::types::id::JobId;
use filevault_entity::job::status::{JobType, UnknownJobType};

/// Errors raised while validating job definitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    /// The type string names no job type, or no handler is registered for it.
    #[error("Unknown job type '{0}'")]
    UnknownJobType(String),

    /// No job with this ID exists.
    #[error("Job not found: {0}")]
    NotFound(JobId),
}

impl From<UnknownJobType> for JobError {
    fn from(err: UnknownJobType) -> Self {
        Self::UnknownJobType(err.0)
    }
}

impl From<JobError> for AppError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::UnknownJobType(_) => AppError::validation(err.to_string()),
            JobError::NotFound(_) => AppError::not_found(err.to_string()),
        }
    }
}

/// Why one execution did not complete successfully.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The job's type has no handler in the registry.
    #[error("No handler registered for job type '{0}'")]
    UnregisteredHandler(JobType),

    /// Another execution of the same job is in progress.
    #[error("Job {0} is already running")]
    AlreadyRunning(JobId),

    /// The handler exceeded its time budget and was aborted.
    #[error("Timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    /// The handler returned an error or panicked.
    #[error("{0}")]
    Handler(String),

    /// Bookkeeping in the job store failed.
    #[error("Job store error: {0}")]
    Store(#[from] AppError),
}

impl From<ExecutionError> for AppError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::Store(inner) => inner,
            ExecutionError::AlreadyRunning(_) => AppError::conflict(err.to_string()),
            ExecutionError::TimedOut(_) => AppError::timeout(err.to_string()),
            ExecutionError::UnregisteredHandler(_) => {
                AppError::new(ErrorKind::Configuration, err.to_string())
            }
            ExecutionError::Handler(_) => AppError::internal(err.to_string()),
        }
    }
}
