//! Concrete repository implementations.

pub mod file;
pub mod job;
pub mod job_log;
pub mod maintenance;
pub mod share;

pub use file::FileRepository;
pub use job::JobRepository;
pub use job_log::JobLogRepository;
pub use maintenance::PgFileMaintenance;
pub use share::ShareRepository;
