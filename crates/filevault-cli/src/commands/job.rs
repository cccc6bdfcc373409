//! Job management CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use filevault_core::error::AppError;
use filevault_core::types::id::{JobId, UserId};
use filevault_core::types::pagination::PageRequest;
use filevault_entity::job::log::ExecutionLog;
use filevault_entity::job::model::{CreateJob, Job, JobFilter, UpdateJob};
use filevault_entity::job::status::JobType;
use filevault_scheduler::{Clock, Schedule};

use super::Cli;

/// Arguments for job commands
#[derive(Debug, Args)]
pub struct JobArgs {
    /// Job subcommand
    #[command(subcommand)]
    pub command: JobCommand,
}

/// Job subcommands
#[derive(Debug, Subcommand)]
pub enum JobCommand {
    /// List jobs, newest first
    List {
        /// Only jobs owned by this user
        #[arg(long)]
        owner: Option<UserId>,
        /// Only jobs of this type
        #[arg(long = "type")]
        job_type: Option<JobType>,
        /// Only active (`true`) or inactive (`false`) jobs
        #[arg(long)]
        active: Option<bool>,
    },
    /// Show one job with its upcoming fire times
    Show {
        /// Job ID
        id: JobId,
    },
    /// Create a job
    Create {
        /// Owning user
        #[arg(long)]
        owner: UserId,
        /// Display name
        #[arg(long)]
        name: String,
        /// Job type
        #[arg(long = "type")]
        job_type: String,
        /// Cron expression or RFC 3339 timestamp; omit for on-demand jobs
        #[arg(long)]
        schedule: Option<String>,
        /// Handler configuration as a JSON object
        #[arg(long, default_value = "{}")]
        config: String,
        /// Create the job paused
        #[arg(long)]
        inactive: bool,
    },
    /// Update a job
    Update {
        /// Job ID
        id: JobId,
        /// New display name
        #[arg(long)]
        name: Option<String>,
        /// New schedule expression
        #[arg(long, conflicts_with = "clear_schedule")]
        schedule: Option<String>,
        /// Remove the schedule, making the job on-demand
        #[arg(long)]
        clear_schedule: bool,
        /// New handler configuration as a JSON object
        #[arg(long)]
        config: Option<String>,
        /// Activate (`true`) or pause (`false`) the job
        #[arg(long)]
        active: Option<bool>,
    },
    /// Delete a job
    Delete {
        /// Job ID
        id: JobId,
    },
    /// Run a job now in this process
    Run {
        /// Job ID
        id: JobId,
    },
    /// Show a job's execution history
    Logs {
        /// Job ID
        id: JobId,
        /// Page number
        #[arg(long, default_value_t = 1)]
        page: u64,
        /// Entries per page
        #[arg(long, default_value_t = 20)]
        per_page: u64,
    },
}

/// Job display row for table output
#[derive(Debug, Serialize, Tabled)]
struct JobRow {
    /// Job ID
    id: String,
    /// Name
    name: String,
    /// Type
    #[tabled(rename = "type")]
    job_type: String,
    /// Schedule
    schedule: String,
    /// Status
    status: String,
    /// Active flag
    active: bool,
    /// Last run
    last_run: String,
    /// Next run
    next_run: String,
}

impl From<&Job> for JobRow {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.to_string(),
            name: output::truncate(&job.name, 32),
            job_type: job.job_type.to_string(),
            schedule: job.schedule.clone().unwrap_or_else(|| "-".to_string()),
            status: job.status.to_string(),
            active: job.is_active,
            last_run: output::format_time(job.last_run),
            next_run: output::format_time(job.next_run),
        }
    }
}

/// Execution log display row for table output
#[derive(Debug, Serialize, Tabled)]
struct LogRow {
    /// Log ID
    id: String,
    /// Status
    status: String,
    /// Started at
    started_at: String,
    /// Completed at
    completed_at: String,
    /// Message
    message: String,
}

impl From<&ExecutionLog> for LogRow {
    fn from(log: &ExecutionLog) -> Self {
        Self {
            id: log.id.to_string(),
            status: log.status.to_string(),
            started_at: output::format_time(Some(log.started_at)),
            completed_at: output::format_time(log.completed_at),
            message: output::truncate(&log.message, 72),
        }
    }
}

/// Execute job commands
pub async fn execute(args: &JobArgs, cli: &Cli) -> Result<(), AppError> {
    let config = cli.load_config()?;
    let db = super::connect(&config).await?;
    let service = super::job_service(&config, &db)?;
    let format = cli.format;

    match &args.command {
        JobCommand::List {
            owner,
            job_type,
            active,
        } => {
            let jobs = service
                .list(&JobFilter {
                    owner_id: *owner,
                    job_type: *job_type,
                    is_active: *active,
                })
                .await?;
            let rows: Vec<JobRow> = jobs.iter().map(JobRow::from).collect();
            output::print_list(&rows, &jobs, format);
        }
        JobCommand::Show { id } => {
            let job = service.get(*id).await?;
            print_job(&job, format);
        }
        JobCommand::Create {
            owner,
            name,
            job_type,
            schedule,
            config,
            inactive,
        } => {
            let job = service
                .create(CreateJob {
                    owner_id: *owner,
                    name: name.clone(),
                    job_type: job_type.clone(),
                    schedule: schedule.clone(),
                    config: parse_config(config)?,
                    is_active: !inactive,
                })
                .await?;
            output::print_success(&format!("Job '{}' created (id: {})", job.name, job.id));
            print_job(&job, format);
        }
        JobCommand::Update {
            id,
            name,
            schedule,
            clear_schedule,
            config,
            active,
        } => {
            let patch = UpdateJob {
                name: name.clone(),
                schedule: if *clear_schedule {
                    Some(None)
                } else {
                    schedule.clone().map(Some)
                },
                config: config.as_deref().map(parse_config).transpose()?,
                is_active: *active,
            };
            let job = service.update(*id, patch).await?;
            output::print_success(&format!("Job '{}' updated", job.name));
            print_job(&job, format);
        }
        JobCommand::Delete { id } => {
            service.delete(*id).await?;
            output::print_success(&format!("Job {} deleted", id));
        }
        JobCommand::Run { id } => {
            let report = service.run_now(*id).await?;
            match format {
                OutputFormat::Json => output::print_json(&report),
                OutputFormat::Table => output::print_success(&report.message),
            }
        }
        JobCommand::Logs { id, page, per_page } => {
            let logs = service
                .list_logs(*id, &PageRequest::new(*page, *per_page))
                .await?;
            match format {
                OutputFormat::Json => output::print_json(&logs),
                OutputFormat::Table => {
                    let rows: Vec<LogRow> = logs.items.iter().map(LogRow::from).collect();
                    output::print_list(&rows, &logs.items, format);
                    println!(
                        "Page {} of {} ({} entries)",
                        logs.page, logs.total_pages, logs.total_items
                    );
                }
            }
        }
    }

    db.close().await;
    Ok(())
}

fn parse_config(raw: &str) -> Result<serde_json::Value, AppError> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::validation(format!("Invalid JSON config: {}", e)))
}

fn print_job(job: &Job, format: OutputFormat) {
    if format == OutputFormat::Json {
        output::print_json(job);
        return;
    }

    output::print_kv("ID", &job.id.to_string());
    output::print_kv("Name", &job.name);
    output::print_kv("Type", job.job_type.as_str());
    output::print_kv("Owner", &job.owner_id.to_string());
    output::print_kv("Schedule", job.schedule.as_deref().unwrap_or("-"));
    output::print_kv("Status", job.status.as_str());
    output::print_kv("Active", &job.is_active.to_string());
    output::print_kv("Last run", &output::format_time(job.last_run));
    output::print_kv("Next run", &output::format_time(job.next_run));
    output::print_kv("Config", &job.config.to_string());

    if let Some(schedule) = job.schedule.as_deref().and_then(|s| Schedule::parse(s).ok()) {
        let upcoming = schedule.upcoming(Clock::system().now(), 3);
        if !upcoming.is_empty() {
            let times: Vec<String> = upcoming.iter().map(|t| t.to_rfc3339()).collect();
            output::print_kv("Upcoming", &times.join(", "));
        }
    }
}
