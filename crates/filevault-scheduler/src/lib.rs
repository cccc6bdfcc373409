//! Recurring job scheduling and execution for FileVault.
//!
//! This crate provides:
//! - A schedule expression parser (cron and one-shot timestamps)
//! - The [`JobStore`] abstraction with PostgreSQL and in-memory backends
//! - A task registry mapping each job type to its handler
//! - An executor enforcing single-flight, timeouts, and panic isolation
//! - The scheduler core keeping one timer per active scheduled job
//! - The [`JobService`] facade used by the daemon and the admin CLI
//! - Built-in handlers for backup, cleanup, virus scan, duplicate
//!   detection, and webhook jobs

pub mod clock;
pub mod error;
pub mod executor;
pub mod registry;
pub mod schedule;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod tasks;

pub use clock::Clock;
pub use error::{ExecutionError, JobError};
pub use executor::{ExecutionOutcome, ExecutionReport, Executor};
pub use registry::{TaskContext, TaskError, TaskHandler, TaskRegistry};
pub use schedule::{Schedule, ScheduleError};
pub use scheduler::{ArmState, Scheduler, TimerState};
pub use service::{JobService, SchedulerStats};
pub use store::{JobStore, MemoryJobStore, PgJobStore};
pub use tasks::{Collaborators, HttpWebhookSender, builtin_registry};
