//! Job scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Recurring job scheduler and executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the scheduler arms timers at startup.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Default per-handler execution timeout in seconds.
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_seconds: u64,
    /// Upper bound on handler executions running at the same time.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_executions: usize,
    /// Interval in seconds between reconciliations with the job store.
    #[serde(default = "default_sync_interval")]
    pub sync_interval_seconds: u64,
    /// How long shutdown waits for in-flight executions, in seconds.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl SchedulerConfig {
    /// Default handler timeout as a [`Duration`].
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_seconds)
    }

    /// Reconciliation interval as a [`Duration`].
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_seconds.max(1))
    }

    /// Shutdown grace period as a [`Duration`].
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            handler_timeout_seconds: default_handler_timeout(),
            max_concurrent_executions: default_max_concurrent(),
            sync_interval_seconds: default_sync_interval(),
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_handler_timeout() -> u64 {
    300
}

fn default_max_concurrent() -> usize {
    8
}

fn default_sync_interval() -> u64 {
    30
}

fn default_shutdown_grace() -> u64 {
    30
}
