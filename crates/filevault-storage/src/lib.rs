//! # filevault-storage
//!
//! Adapters that give the scheduler's backup and virus-scan jobs access to
//! locally stored content: a directory mirror implementing
//! [`RemoteBackup`](filevault_core::traits::RemoteBackup) and a clamd client
//! implementing [`VirusScanner`](filevault_core::traits::VirusScanner).

pub mod clamd;
pub mod mirror;
pub mod path;

pub use clamd::ClamdScanner;
pub use mirror::MirrorBackup;
