//! Malware scan of selected paths.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Value, json};

use filevault_core::traits::{ScanVerdict, VirusScanner};
use filevault_entity::job::status::JobType;

use super::{PATH_CONCURRENCY, string_list};
use crate::registry::{TaskContext, TaskError, TaskHandler};

/// Handles `virus_scan` jobs
#[derive(Debug)]
pub struct VirusScanTask {
    scanner: Arc<dyn VirusScanner>,
}

impl VirusScanTask {
    /// Create a new virus scan task
    pub fn new(scanner: Arc<dyn VirusScanner>) -> Self {
        Self { scanner }
    }
}

#[async_trait]
impl TaskHandler for VirusScanTask {
    fn job_type(&self) -> JobType {
        JobType::VirusScan
    }

    async fn execute(&self, ctx: TaskContext) -> Result<Option<Value>, TaskError> {
        let paths = string_list(&ctx.config, "paths")?;
        tracing::info!("Scanning {} paths", paths.len());

        let verdicts: Vec<(String, ScanVerdict)> = futures::stream::iter(paths)
            .map(|path| async move {
                let verdict = self.scanner.scan(&path).await?;
                Ok::<_, TaskError>((path, verdict))
            })
            .buffered(PATH_CONCURRENCY)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_, _>>()?;

        let infected: Vec<String> = verdicts
            .iter()
            .filter_map(|(path, verdict)| match verdict {
                ScanVerdict::Infected { signature } => Some(format!("{path} ({signature})")),
                ScanVerdict::Clean => None,
            })
            .collect();

        if !infected.is_empty() {
            tracing::warn!("Infected files found: {}", infected.join(", "));
            return Err(TaskError::Failed(format!(
                "Infected files found: {}",
                infected.join(", ")
            )));
        }

        Ok(Some(json!({
            "scanned": verdicts.len(),
            "clean": verdicts.len(),
        })))
    }
}
