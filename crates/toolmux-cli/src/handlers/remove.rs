//! Remove command handler.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::error::CliError;

pub async fn execute(ctx: &CliContext, name: &str) -> Result<()> {
    let removed = ctx.runtime.remove_server(name).await.map_err(CliError::from)?;
    println!("Removed server '{}'.", removed.name);
    Ok(())
}
