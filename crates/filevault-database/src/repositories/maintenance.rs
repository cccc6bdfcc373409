//! PostgreSQL-backed [`FileMaintenance`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use filevault_core::result::AppResult;
use filevault_core::traits::FileMaintenance;

use super::file::FileRepository;
use super::share::ShareRepository;

/// Retention maintenance over the `files` and `share_links` tables.
#[derive(Debug, Clone)]
pub struct PgFileMaintenance {
    files: FileRepository,
    shares: ShareRepository,
}

impl PgFileMaintenance {
    /// Combine the file and share repositories.
    pub fn new(files: FileRepository, shares: ShareRepository) -> Self {
        Self { files, shares }
    }
}

#[async_trait]
impl FileMaintenance for PgFileMaintenance {
    async fn purge_soft_deleted(&self, older_than: DateTime<Utc>) -> AppResult<u64> {
        let purged = self.files.purge_soft_deleted(older_than).await?;
        debug!(purged, cutoff = %older_than, "Purged soft-deleted files");
        Ok(purged)
    }

    async fn deactivate_expired_shares(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let deactivated = self.shares.deactivate_expired(now).await?;
        debug!(deactivated, "Deactivated expired share links");
        Ok(deactivated)
    }
}
