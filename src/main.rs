//! FileVault job scheduler daemon.
//!
//! Loads configuration, connects to PostgreSQL, arms every active scheduled
//! job, and runs until interrupted.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use filevault_core::config::AppConfig;
use filevault_core::error::AppError;
use filevault_database::DatabasePool;
use filevault_scheduler::{Clock, Collaborators, JobService, PgJobStore, builtin_registry};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Scheduler error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("FILEVAULT_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    let env = std::env::var("FILEVAULT_ENV").unwrap_or_else(|_| "development".to_string());

    AppConfig::load(&config_path, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting FileVault scheduler v{}", env!("CARGO_PKG_VERSION"));

    // ── Database connection + migrations ─────────────────────────
    let db = DatabasePool::connect(&config.database).await?;
    tracing::info!("Running database migrations...");
    db.migrate().await?;

    // ── Handlers and their collaborators ─────────────────────────
    let collaborators = Collaborators::connect(&config, db.pool().clone())?;
    let registry = builtin_registry(&collaborators);
    tracing::info!(
        handlers = ?registry.registered_types(),
        data_root = %config.storage.data_root,
        clamd = %config.virus_scan.clamd_address,
        "Task handlers ready"
    );

    let service = JobService::assemble(
        Arc::new(PgJobStore::new(db.pool().clone())),
        registry,
        Clock::system(),
        &config.scheduler,
    );

    if !config.scheduler.enabled {
        tracing::warn!("Scheduler is disabled in configuration, no jobs will be armed");
        db.close().await;
        return Ok(());
    }

    // ── Arm timers ───────────────────────────────────────────────
    let armed = service.scheduler().start().await?;
    let stats = service.stats().await?;
    tracing::info!(
        armed,
        total_jobs = stats.total_jobs,
        active_jobs = stats.active_jobs,
        failed_jobs = stats.failed_jobs,
        "Scheduler running"
    );

    shutdown_signal().await;

    // ── Graceful shutdown ────────────────────────────────────────
    tracing::info!("Shutdown signal received, stopping scheduler...");
    if !service.scheduler().shutdown().await {
        tracing::warn!("Some executions were still running at exit");
    }
    db.close().await;
    tracing::info!("FileVault scheduler stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
