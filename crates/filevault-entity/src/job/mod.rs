//! Scheduled job domain entities.

pub mod log;
pub mod model;
pub mod status;

pub use log::{ExecutionLog, LogCompletion, LogStatus, NewExecutionLog};
pub use model::{CreateJob, Job, JobCounts, JobFilter, UpdateJob};
pub use status::{JobStatus, JobType, UnknownJobType};
