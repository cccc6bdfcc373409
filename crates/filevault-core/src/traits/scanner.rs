//! Malware scanning boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;

/// Result of scanning one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ScanVerdict {
    /// Nothing found.
    Clean,
    /// A signature matched.
    Infected {
        /// Signature name reported by the scanner.
        signature: String,
    },
}

impl ScanVerdict {
    /// Whether the scanned object is infected.
    pub fn is_infected(&self) -> bool {
        matches!(self, Self::Infected { .. })
    }
}

/// Scans locally stored objects for malware.
#[async_trait]
pub trait VirusScanner: Send + Sync + std::fmt::Debug + 'static {
    /// Scan the object identified by `local_ref`.
    async fn scan(&self, local_ref: &str) -> AppResult<ScanVerdict>;
}
