//! Install command handler.

use anyhow::Result;
use serde_json::json;
use toolmux_core::InstallStatus;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::print_json;

/// Run the installation and print its log.
pub async fn execute(ctx: &CliContext, name: &str, as_json: bool) -> Result<()> {
    let job = ctx.runtime.install(name).await;

    if as_json {
        print_json(&json!(job));
    } else {
        for step in &job.log {
            println!("[{}] {:<22} {}", step.at.format("%H:%M:%S"), step.status.to_string(), step.message);
        }
    }

    if job.status == InstallStatus::Done {
        if !as_json {
            println!("Installed '{name}'.");
        }
        return Ok(());
    }
    Err(CliError::Install {
        server: name.to_string(),
        reason: job.failure.map_or_else(|| job.status.to_string(), |f| f.to_string()),
    }
    .into())
}
