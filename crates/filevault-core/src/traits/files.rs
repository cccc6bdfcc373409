//! File-table maintenance operations owned by the filesystem service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::AppResult;
use crate::types::id::FileId;

/// A set of live files sharing the same content checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateSet {
    /// Content checksum shared by every file in the set.
    pub checksum: String,
    /// Files carrying that checksum.
    pub file_ids: Vec<FileId>,
}

/// Retention maintenance on the virtual filesystem.
#[async_trait]
pub trait FileMaintenance: Send + Sync + std::fmt::Debug + 'static {
    /// Permanently remove soft-deleted files deleted before `older_than`.
    ///
    /// Returns the number of purged records.
    async fn purge_soft_deleted(&self, older_than: DateTime<Utc>) -> AppResult<u64>;

    /// Deactivate share links whose expiry is before `now`.
    ///
    /// Returns the number of links deactivated.
    async fn deactivate_expired_shares(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

/// Read access to the per-file content checksums.
#[async_trait]
pub trait ChecksumIndex: Send + Sync + std::fmt::Debug + 'static {
    /// Group live files by checksum, returning only groups with at least two files.
    async fn group_by_checksum(&self) -> AppResult<Vec<DuplicateSet>>;
}
