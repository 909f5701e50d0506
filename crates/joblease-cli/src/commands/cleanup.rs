//! Retention cleanup of finished jobs.

use clap::Args;

use crate::output;
use joblease_core::error::AppError;

/// Arguments for the cleanup command
#[derive(Debug, Args)]
pub struct CleanupArgs {
    /// Delete jobs finished more than this many days ago (defaults to `recovery.retention_days`)
    #[arg(short, long)]
    pub days: Option<u32>,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Execute the cleanup command
pub async fn execute(args: &CleanupArgs, config_path: &str) -> Result<(), AppError> {
    let ctx = super::open_context(config_path).await?;
    let days = args.days.unwrap_or(ctx.config.recovery.retention_days);

    if !args.yes {
        let confirm = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Delete completed and failed jobs older than {} day(s)?",
                days
            ))
            .default(false)
            .interact()
            .map_err(|e| AppError::internal(format!("Input error: {}", e)))?;

        if !confirm {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let removed = ctx.queue.cleanup_terminal(days).await?;
    output::print_success(&format!("Deleted {} job(s).", removed));
    Ok(())
}
