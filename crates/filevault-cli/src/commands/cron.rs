//! Schedule expression inspection.

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use filevault_core::error::AppError;
use filevault_scheduler::Schedule;

/// Arguments for cron commands
#[derive(Debug, Args)]
pub struct CronArgs {
    /// Cron subcommand
    #[command(subcommand)]
    pub command: CronCommand,
}

/// Cron subcommands
#[derive(Debug, Subcommand)]
pub enum CronCommand {
    /// Show the next fire times of an expression
    Next {
        /// Cron expression or RFC 3339 timestamp
        expression: String,
        /// Number of fire times to list
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
        /// Start searching after this time (RFC 3339), default now
        #[arg(long)]
        after: Option<DateTime<Utc>>,
    },
}

/// Fire time display row
#[derive(Debug, Serialize, Tabled)]
struct FireTimeRow {
    /// Position
    #[tabled(rename = "#")]
    index: usize,
    /// Fire time
    fire_time: String,
}

/// Execute cron commands
pub fn execute(args: &CronArgs, format: OutputFormat) -> Result<(), AppError> {
    match &args.command {
        CronCommand::Next {
            expression,
            count,
            after,
        } => {
            let schedule = Schedule::parse(expression)?;
            let times = schedule.upcoming(after.unwrap_or_else(Utc::now), *count);
            if times.is_empty() {
                println!("'{}' has no upcoming occurrence.", schedule);
                return Ok(());
            }

            let rows: Vec<FireTimeRow> = times
                .iter()
                .enumerate()
                .map(|(i, at)| FireTimeRow {
                    index: i + 1,
                    fire_time: at.to_rfc3339(),
                })
                .collect();
            output::print_list(&rows, &times, format);
        }
    }
    Ok(())
}
