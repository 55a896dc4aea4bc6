//! Command handlers.
//!
//! Each invocation of the CLI is its own short-lived runtime, so commands that
//! need tools install (when required) and connect first, then shut down.

pub mod add;
pub mod call;
pub mod install;
pub mod remove;
pub mod resources;
pub mod servers;
pub mod templates;
pub mod tools;

use toolmux_core::{InstallStatus, ServerDefinition};
use toolmux_mcp::RuntimeError;
use tracing::warn;

use crate::bootstrap::CliContext;
use crate::error::CliError;

async fn ensure_installed(ctx: &CliContext, definition: &ServerDefinition) -> Result<(), CliError> {
    if !definition.install_required || ctx.runtime.installer().is_installed(&definition.name) {
        return Ok(());
    }
    let job = ctx.runtime.install(&definition.name).await;
    if job.status == InstallStatus::Done {
        return Ok(());
    }
    Err(CliError::Install {
        server: definition.name.clone(),
        reason: job.failure.map_or_else(|| job.status.to_string(), |f| f.to_string()),
    })
}

/// Install and connect `only`, or every registered server.
///
/// A single named server must come up; with no name, servers that fail are
/// reported on stderr and skipped. Returns the number of connected servers.
pub async fn connect_servers(ctx: &CliContext, only: Option<&str>) -> Result<usize, CliError> {
    if let Some(name) = only {
        let definition = ctx.runtime.registry().get(name).await.map_err(RuntimeError::from)?;
        ensure_installed(ctx, &definition).await?;
        ctx.runtime.connect(name).await?;
        return Ok(1);
    }

    for definition in ctx.runtime.list_servers(None).await {
        if let Err(e) = ensure_installed(ctx, &definition).await {
            warn!(server = %definition.name, error = %e, "install failed");
            eprintln!("warning: {e}");
        }
    }

    let mut connected = 0;
    for (name, result) in ctx.runtime.connections().connect_all().await {
        match result {
            Ok(_) => connected += 1,
            Err(e) => eprintln!("warning: skipping '{name}': {e}"),
        }
    }
    Ok(connected)
}
