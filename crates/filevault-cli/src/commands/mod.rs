//! CLI command definitions and dispatch.

pub mod cron;
pub mod job;
pub mod migrate;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use filevault_core::config::AppConfig;
use filevault_core::error::AppError;
use filevault_database::DatabasePool;
use filevault_scheduler::{Clock, Collaborators, JobService, PgJobStore, builtin_registry};

/// FileVault background job administration
#[derive(Debug, Parser)]
#[command(name = "filevault-cli", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "FILEVAULT_CONFIG", default_value = "config/default.toml")]
    pub config: String,

    /// Configuration environment overlay (`config/<env>.toml`)
    #[arg(long, env = "FILEVAULT_ENV", default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage scheduled jobs
    Job(job::JobArgs),
    /// Inspect schedule expressions
    Cron(cron::CronArgs),
    /// Apply pending database migrations
    Migrate,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Job(args) => job::execute(args, self).await,
            Commands::Cron(args) => cron::execute(args, self.format),
            Commands::Migrate => migrate::execute(self).await,
        }
    }

    /// Load configuration from file, environment overlay, and variables
    pub fn load_config(&self) -> Result<AppConfig, AppError> {
        AppConfig::load(&self.config, &self.env)
    }
}

/// Helper: connect to the database named in the configuration
pub async fn connect(config: &AppConfig) -> Result<DatabasePool, AppError> {
    DatabasePool::connect(&config.database).await
}

/// Helper: job service over PostgreSQL with the built-in handlers
///
/// The scheduler is never started here. The daemon picks up changes made
/// through the CLI on its next reconciliation.
pub fn job_service(config: &AppConfig, db: &DatabasePool) -> Result<JobService, AppError> {
    let collaborators = Collaborators::connect(config, db.pool().clone())?;
    Ok(JobService::assemble(
        Arc::new(PgJobStore::new(db.pool().clone())),
        builtin_registry(&collaborators),
        Clock::system(),
        &config.scheduler,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_job_create() {
        let cli = Cli::try_parse_from([
            "filevault-cli",
            "--format",
            "json",
            "job",
            "create",
            "--owner",
            "6f1c8a52-3b9e-4a57-9d39-0b7e1e2f4c11",
            "--name",
            "nightly cleanup",
            "--type",
            "cleanup",
            "--schedule",
            "0 3 * * *",
            "--config",
            r#"{"retentionDays": 14}"#,
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Job(args) => match args.command {
                job::JobCommand::Create { name, schedule, .. } => {
                    assert_eq!(name, "nightly cleanup");
                    assert_eq!(schedule.as_deref(), Some("0 3 * * *"));
                }
                other => panic!("unexpected command: {other:?}"),
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_schedule_and_clear_conflict() {
        let result = Cli::try_parse_from([
            "filevault-cli",
            "job",
            "update",
            "6f1c8a52-3b9e-4a57-9d39-0b7e1e2f4c11",
            "--schedule",
            "* * * * *",
            "--clear-schedule",
        ]);
        assert!(result.is_err());
    }
}
