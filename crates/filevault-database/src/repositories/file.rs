//! File repository implementation.
//!
//! Only the maintenance queries live here; regular file CRUD belongs to the
//! file service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use filevault_core::error::{AppError, ErrorKind};
use filevault_core::result::AppResult;
use filevault_core::traits::{ChecksumIndex, DuplicateSet};
use filevault_core::types::id::FileId;

/// Repository for file maintenance queries.
#[derive(Debug, Clone)]
pub struct FileRepository {
    pool: PgPool,
}

impl FileRepository {
    /// Create a new file repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Permanently remove soft-deleted files whose deletion predates the cutoff.
    pub async fn purge_soft_deleted(&self, older_than: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM files WHERE is_deleted = TRUE AND deleted_at IS NOT NULL AND deleted_at < $1",
        )
        .bind(older_than)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to purge deleted files", e)
        })?;
        Ok(result.rows_affected())
    }

    /// Group live files by checksum, returning only groups with more than one member.
    pub async fn find_duplicate_groups(&self) -> AppResult<Vec<DuplicateSet>> {
        let rows: Vec<(String, Vec<Uuid>)> = sqlx::query_as(
            "SELECT checksum, ARRAY_AGG(id ORDER BY created_at ASC) \
             FROM files \
             WHERE is_deleted = FALSE AND checksum IS NOT NULL \
             GROUP BY checksum \
             HAVING COUNT(*) > 1 \
             ORDER BY checksum",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to group files by checksum", e)
        })?;

        Ok(rows
            .into_iter()
            .map(|(checksum, ids)| DuplicateSet {
                checksum,
                file_ids: ids.into_iter().map(FileId::from_uuid).collect(),
            })
            .collect())
    }
}

#[async_trait]
impl ChecksumIndex for FileRepository {
    async fn group_by_checksum(&self) -> AppResult<Vec<DuplicateSet>> {
        self.find_duplicate_groups().await
    }
}
