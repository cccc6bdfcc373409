//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod integrations;
pub mod logging;
pub mod scheduler;
pub mod storage;

use serde::{Deserialize, Serialize};

pub use self::integrations::{VirusScanConfig, WebhookConfig};
pub use self::logging::LoggingConfig;
pub use self::scheduler::SchedulerConfig;
pub use self::storage::StorageConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    pub database: DatabaseConfig,
    /// Job scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// File storage settings used by backup and scan jobs.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Virus scanner daemon settings.
    #[serde(default)]
    pub virus_scan: VirusScanConfig,
    /// Outbound webhook settings.
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Idle connection timeout in seconds.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the base configuration file, an optional environment-specific
    /// overlay (`config/{env}`), and environment variables prefixed with
    /// `FILEVAULT_` (nested keys separated by `__`).
    pub fn load(path: &str, env: &str) -> Result<Self, AppError> {
        let base = path.trim_end_matches(".toml");
        let config = config::Config::builder()
            .add_source(config::File::with_name(base).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("FILEVAULT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_fall_back_to_defaults() {
        let raw = r#"{ "database": { "url": "postgres://localhost/filevault" } }"#;
        let config: AppConfig = serde_json::from_str(raw).expect("deserialize");

        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.scheduler.handler_timeout_seconds, 300);
        assert_eq!(config.scheduler.max_concurrent_executions, 8);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.virus_scan.clamd_address, "127.0.0.1:3310");
    }
}
