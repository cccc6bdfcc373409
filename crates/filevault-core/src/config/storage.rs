//! Storage configuration.

use serde::{Deserialize, Serialize};

/// Local storage locations used by backup and scan jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory that job `paths` are resolved against.
    #[serde(default = "default_data_root")]
    pub data_root: String,
    /// Directory backups are mirrored into.
    #[serde(default = "default_backup_root")]
    pub backup_root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            backup_root: default_backup_root(),
        }
    }
}

fn default_data_root() -> String {
    "./data/storage".to_string()
}

fn default_backup_root() -> String {
    "./data/backup".to_string()
}
