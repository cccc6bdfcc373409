//! # filevault-database
//!
//! PostgreSQL connection management, the migration runner, and concrete
//! repositories for jobs, execution logs, and the file/share tables the
//! maintenance jobs operate on.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
