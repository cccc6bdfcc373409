//! ClamAV daemon client speaking the `INSTREAM` protocol over TCP.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use filevault_core::config::{StorageConfig, VirusScanConfig};
use filevault_core::error::{AppError, ErrorKind};
use filevault_core::result::AppResult;
use filevault_core::traits::{ScanVerdict, VirusScanner};

use crate::path::resolve_under;

/// Bytes sent per `INSTREAM` chunk.
const CHUNK_SIZE: usize = 64 * 1024;

/// Scans files under the storage root by streaming them to clamd.
#[derive(Debug, Clone)]
pub struct ClamdScanner {
    /// `host:port` of the clamd socket.
    address: String,
    /// Directory job paths are resolved against.
    data_root: PathBuf,
    /// Upper bound for one complete scan.
    timeout: Duration,
}

impl ClamdScanner {
    /// Create a scanner for the given daemon and storage root.
    pub fn new(address: impl Into<String>, data_root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            data_root: data_root.into(),
            timeout,
        }
    }

    /// Create a scanner from configuration.
    pub fn from_config(scan: &VirusScanConfig, storage: &StorageConfig) -> Self {
        Self::new(
            &scan.clamd_address,
            &storage.data_root,
            Duration::from_secs(scan.timeout_seconds),
        )
    }

    async fn stream_file(&self, mut file: File) -> AppResult<String> {
        let mut socket = TcpStream::connect(&self.address).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::ExternalService,
                format!("Failed to connect to clamd at {}", self.address),
                e,
            )
        })?;

        socket.write_all(b"zINSTREAM\0").await?;

        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let read = file.read(&mut buf).await?;
            if read == 0 {
                break;
            }
            socket.write_all(&(read as u32).to_be_bytes()).await?;
            socket.write_all(&buf[..read]).await?;
        }
        socket.write_all(&0u32.to_be_bytes()).await?;
        socket.flush().await?;

        let mut reply = Vec::new();
        socket.read_to_end(&mut reply).await?;
        Ok(String::from_utf8_lossy(&reply).into_owned())
    }
}

/// Interpret a clamd reply such as `stream: OK` or `stream: Eicar FOUND`.
pub fn parse_reply(reply: &str) -> AppResult<ScanVerdict> {
    let reply = reply.trim_end_matches('\0').trim();
    let body = reply.strip_prefix("stream:").map(str::trim).unwrap_or(reply);

    if body == "OK" {
        return Ok(ScanVerdict::Clean);
    }
    if let Some(signature) = body.strip_suffix("FOUND") {
        return Ok(ScanVerdict::Infected {
            signature: signature.trim().to_string(),
        });
    }
    Err(AppError::external_service(format!(
        "clamd returned an error: {body}"
    )))
}

#[async_trait]
impl VirusScanner for ClamdScanner {
    async fn scan(&self, local_ref: &str) -> AppResult<ScanVerdict> {
        let path = resolve_under(&self.data_root, local_ref)?;
        let file = File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Scan target not found: {local_ref}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to open scan target: {local_ref}"),
                    e,
                )
            }
        })?;

        let reply = tokio::time::timeout(self.timeout, self.stream_file(file))
            .await
            .map_err(|_| AppError::timeout(format!("Scan of {local_ref} timed out")))??;

        let verdict = parse_reply(&reply)?;
        match &verdict {
            ScanVerdict::Clean => debug!(local_ref, "Scan clean"),
            ScanVerdict::Infected { signature } => {
                warn!(local_ref, signature = %signature, "Infected file detected")
            }
        }
        Ok(verdict)
    }
}
