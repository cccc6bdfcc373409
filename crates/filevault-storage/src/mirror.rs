//! Directory mirror backup destination.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use filevault_core::config::StorageConfig;
use filevault_core::error::{AppError, ErrorKind};
use filevault_core::result::AppResult;
use filevault_core::traits::RemoteBackup;

use crate::path::resolve_under;

/// Copies objects from the storage root into a mirror directory, keeping
/// their relative layout.
#[derive(Debug, Clone)]
pub struct MirrorBackup {
    /// Directory job paths are resolved against.
    source_root: PathBuf,
    /// Directory backups are written into.
    backup_root: PathBuf,
}

impl MirrorBackup {
    /// Create a mirror between two directories.
    pub fn new(source_root: impl Into<PathBuf>, backup_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            backup_root: backup_root.into(),
        }
    }

    /// Create a mirror from the storage section of the configuration.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.data_root, &config.backup_root)
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> AppResult<u64> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create backup directory: {}", parent.display()),
                    e,
                )
            })?;
        }

        fs::copy(from, to).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to copy {} to {}", from.display(), to.display()),
                e,
            )
        })
    }

    /// Copy a directory tree, returning the number of files copied.
    async fn copy_tree(&self, from: &Path, to: &Path) -> AppResult<u64> {
        let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];
        let mut copied = 0;

        while let Some((src_dir, dst_dir)) = pending.pop() {
            let mut entries = fs::read_dir(&src_dir).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read directory: {}", src_dir.display()),
                    e,
                )
            })?;

            while let Some(entry) = entries.next_entry().await? {
                let src = entry.path();
                let dst = dst_dir.join(entry.file_name());
                if entry.file_type().await?.is_dir() {
                    pending.push((src, dst));
                } else {
                    self.copy_file(&src, &dst).await?;
                    copied += 1;
                }
            }
        }

        Ok(copied)
    }
}

#[async_trait]
impl RemoteBackup for MirrorBackup {
    fn destination(&self) -> &str {
        "mirror"
    }

    async fn copy_to_remote(&self, local_ref: &str) -> AppResult<()> {
        let source = resolve_under(&self.source_root, local_ref)?;
        let target = resolve_under(&self.backup_root, local_ref)?;

        let metadata = fs::metadata(&source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Backup source not found: {local_ref}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to stat backup source: {local_ref}"),
                    e,
                )
            }
        })?;

        if metadata.is_dir() {
            let files = self.copy_tree(&source, &target).await?;
            debug!(local_ref, files, "Mirrored directory");
        } else {
            let bytes = self.copy_file(&source, &target).await?;
            debug!(local_ref, bytes, "Mirrored file");
        }
        Ok(())
    }
}
