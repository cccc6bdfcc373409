//! Collaborator traits consumed by background task handlers.
//!
//! The traits are defined here in `filevault-core` so handlers in
//! `filevault-scheduler` can depend on them without knowing which crate
//! provides the implementation (`filevault-database`, `filevault-storage`,
//! or an in-memory fake in tests).

pub mod backup;
pub mod files;
pub mod scanner;
pub mod webhook;

pub use backup::RemoteBackup;
pub use files::{ChecksumIndex, DuplicateSet, FileMaintenance};
pub use scanner::{ScanVerdict, VirusScanner};
pub use webhook::WebhookSender;
