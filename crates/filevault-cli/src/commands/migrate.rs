//! Database migration command.

use crate::output;
use filevault_core::error::AppError;

use super::Cli;

/// Run all pending migrations
pub async fn execute(cli: &Cli) -> Result<(), AppError> {
    let config = cli.load_config()?;
    let db = super::connect(&config).await?;

    println!("Running database migrations...");
    db.migrate().await?;
    db.close().await;

    output::print_success("All migrations applied successfully.");
    Ok(())
}
