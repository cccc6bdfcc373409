//! Built-in task handlers.

pub mod backup;
pub mod cleanup;
pub mod duplicate;
pub mod virus_scan;
pub mod webhook;

use std::sync::Arc;

use serde_json::Value;
use sqlx::PgPool;

use filevault_core::config::AppConfig;
use filevault_core::result::AppResult;
use filevault_core::traits::{
    ChecksumIndex, FileMaintenance, RemoteBackup, VirusScanner, WebhookSender,
};
use filevault_database::repositories::{FileRepository, PgFileMaintenance, ShareRepository};
use filevault_storage::{ClamdScanner, MirrorBackup};

use crate::registry::{TaskError, TaskRegistry};

pub use backup::BackupTask;
pub use cleanup::CleanupTask;
pub use duplicate::DuplicateDetectionTask;
pub use virus_scan::VirusScanTask;
pub use webhook::{HttpWebhookSender, WebhookTask};

/// Paths handled concurrently by the backup and scan tasks.
const PATH_CONCURRENCY: usize = 4;

/// External services the built-in handlers operate on.
#[derive(Debug, Clone)]
pub struct Collaborators {
    /// Soft-delete purging and share expiry.
    pub maintenance: Arc<dyn FileMaintenance>,
    /// Content checksums of live files.
    pub checksums: Arc<dyn ChecksumIndex>,
    /// Backup destination.
    pub backup: Arc<dyn RemoteBackup>,
    /// Malware scanner.
    pub scanner: Arc<dyn VirusScanner>,
    /// Outbound webhook delivery.
    pub webhooks: Arc<dyn WebhookSender>,
}

impl Collaborators {
    /// Production collaborators: PostgreSQL file tables, the storage mirror,
    /// clamd, and HTTP webhooks.
    pub fn connect(config: &AppConfig, pool: PgPool) -> AppResult<Self> {
        let files = FileRepository::new(pool.clone());
        let shares = ShareRepository::new(pool);

        Ok(Self {
            maintenance: Arc::new(PgFileMaintenance::new(files.clone(), shares)),
            checksums: Arc::new(files),
            backup: Arc::new(MirrorBackup::from_config(&config.storage)),
            scanner: Arc::new(ClamdScanner::from_config(&config.virus_scan, &config.storage)),
            webhooks: Arc::new(HttpWebhookSender::new(&config.webhook)?),
        })
    }
}

/// Registry with one handler for every job type.
pub fn builtin_registry(collaborators: &Collaborators) -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry.register(Arc::new(BackupTask::new(Arc::clone(&collaborators.backup))));
    registry.register(Arc::new(CleanupTask::new(Arc::clone(
        &collaborators.maintenance,
    ))));
    registry.register(Arc::new(DuplicateDetectionTask::new(Arc::clone(
        &collaborators.checksums,
    ))));
    registry.register(Arc::new(VirusScanTask::new(Arc::clone(&collaborators.scanner))));
    registry.register(Arc::new(WebhookTask::new(Arc::clone(&collaborators.webhooks))));
    registry
}

/// Read `config[key]` as an array of non-empty strings.
pub(crate) fn string_list(config: &Value, key: &str) -> Result<Vec<String>, TaskError> {
    let items = config
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| TaskError::InvalidConfig(format!("'{key}' must be an array of paths")))?;

    items
        .iter()
        .map(|item| match item.as_str().map(str::trim) {
            Some(path) if !path.is_empty() => Ok(path.to_string()),
            _ => Err(TaskError::InvalidConfig(format!(
                "'{key}' entries must be non-empty strings"
            ))),
        })
        .collect()
}

/// Read `config[key]` as a non-negative integer, accepting numeric strings.
pub(crate) fn integer_option(config: &Value, key: &str) -> Result<Option<u64>, TaskError> {
    let invalid = || TaskError::InvalidConfig(format!("'{key}' must be a non-negative integer"));
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<u64>().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}
