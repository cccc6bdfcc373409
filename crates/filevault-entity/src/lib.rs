//! # filevault-entity
//!
//! Domain entity models for the FileVault job scheduler. Every struct in
//! this crate represents a database table row or a domain value object.
//! Row types additionally derive `sqlx::FromRow`; enums map onto
//! PostgreSQL enum types via `sqlx::Type`.

pub mod job;

pub use job::{
    CreateJob, ExecutionLog, Job, JobCounts, JobFilter, JobStatus, JobType, LogCompletion, LogStatus,
    NewExecutionLog, UpdateJob,
};
