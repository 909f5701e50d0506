//! One-off lease recovery sweep.

use crate::output::{self, OutputFormat};
use joblease_core::error::AppError;

/// Run one recovery sweep and report what it touched
pub async fn execute(config_path: &str, format: OutputFormat) -> Result<(), AppError> {
    let ctx = super::open_context(config_path).await?;
    let report = ctx.leases.recover_expired_leases().await?;

    if format == OutputFormat::Table && report.recovered_count == 0 && report.errors == 0 {
        output::print_success("No expired leases.");
        return Ok(());
    }

    output::print_item("Recovery sweep", &report, format);
    if report.errors > 0 {
        output::print_warning(&format!(
            "{} expired lease(s) could not be recovered; see logs",
            report.errors
        ));
    }
    Ok(())
}
