//! Remote backup boundary.

use async_trait::async_trait;

use crate::result::AppResult;

/// Copies locally stored content to a backup destination.
#[async_trait]
pub trait RemoteBackup: Send + Sync + std::fmt::Debug + 'static {
    /// Name of the destination kind, used in log messages.
    fn destination(&self) -> &str;

    /// Copy the object identified by `local_ref` to the backup destination.
    async fn copy_to_remote(&self, local_ref: &str) -> AppResult<()>;
}
