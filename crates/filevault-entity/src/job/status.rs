//! Job type and status enumerations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of task types a job can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Copy files to a backup destination.
    Backup,
    /// Purge expired soft-deleted files and share links.
    Cleanup,
    /// Scan files for malware.
    VirusScan,
    /// Report files with identical content.
    DuplicateDetection,
    /// Deliver a payload to an HTTP endpoint.
    Webhook,
}

impl JobType {
    /// Every job type, in declaration order.
    pub const ALL: [JobType; 5] = [
        Self::Backup,
        Self::Cleanup,
        Self::VirusScan,
        Self::DuplicateDetection,
        Self::Webhook,
    ];

    /// Return the type as its wire/database string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backup => "backup",
            Self::Cleanup => "cleanup",
            Self::VirusScan => "virus_scan",
            Self::DuplicateDetection => "duplicate_detection",
            Self::Webhook => "webhook",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known job type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job type '{0}'")]
pub struct UnknownJobType(pub String);

impl FromStr for JobType {
    type Err = UnknownJobType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownJobType(s.to_string()))
    }
}

/// Last known run state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Enabled; the most recent scheduled run (if any) succeeded.
    Active,
    /// Disabled by an operator.
    Paused,
    /// An on-demand run finished successfully.
    Completed,
    /// The most recent run or arm attempt failed.
    Failed,
}

impl JobStatus {
    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_type_parses_every_variant() {
        for job_type in JobType::ALL {
            assert_eq!(job_type.as_str().parse::<JobType>(), Ok(job_type));
        }
    }

    #[test]
    fn test_unknown_job_type() {
        let err = "thumbnail".parse::<JobType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown job type 'thumbnail'");
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&JobType::DuplicateDetection).unwrap();
        assert_eq!(json, "\"duplicate_detection\"");
        let status: JobStatus = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(status, JobStatus::Paused);
    }
}
