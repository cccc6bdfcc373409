//! Execution log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use filevault_core::types::id::{ExecutionLogId, JobId};

/// State of one execution log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_log_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    /// The handler is running.
    Started,
    /// The handler finished successfully.
    Completed,
    /// The run failed.
    Failed,
}

impl LogStatus {
    /// Whether the entry has received its terminal update.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record of one job run.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExecutionLog {
    /// Entry identifier.
    pub id: ExecutionLogId,
    /// The job that ran.
    pub job_id: JobId,
    /// Current state of the run.
    pub status: LogStatus,
    /// Human-readable outcome.
    pub message: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

/// A `started` entry to append before invoking a handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExecutionLog {
    /// The job about to run.
    pub job_id: JobId,
    /// Start message.
    pub message: String,
    /// Start time.
    pub started_at: DateTime<Utc>,
}

/// The single terminal update of an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogCompletion {
    /// `Completed` or `Failed`.
    pub status: LogStatus,
    /// Outcome message.
    pub message: String,
    /// Completion time.
    pub completed_at: DateTime<Utc>,
}
