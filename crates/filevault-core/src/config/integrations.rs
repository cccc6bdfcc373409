//! Settings for the external services task handlers talk to.

use serde::{Deserialize, Serialize};

/// ClamAV daemon connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirusScanConfig {
    /// `host:port` of the clamd TCP socket.
    #[serde(default = "default_clamd_address")]
    pub clamd_address: String,
    /// Per-file scan timeout in seconds.
    #[serde(default = "default_scan_timeout")]
    pub timeout_seconds: u64,
}

impl Default for VirusScanConfig {
    fn default() -> Self {
        Self {
            clamd_address: default_clamd_address(),
            timeout_seconds: default_scan_timeout(),
        }
    }
}

/// Outbound webhook delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_webhook_timeout")]
    pub timeout_seconds: u64,
    /// `User-Agent` header sent with every delivery.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_webhook_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_clamd_address() -> String {
    "127.0.0.1:3310".to_string()
}

fn default_scan_timeout() -> u64 {
    60
}

fn default_webhook_timeout() -> u64 {
    15
}

fn default_user_agent() -> String {
    "FileVault-Webhook/1.0".to_string()
}
