//! Tools and search command handlers.

use anyhow::Result;
use serde_json::json;
use toolmux_mcp::CatalogEntry;

use crate::bootstrap::CliContext;
use crate::handlers::connect_servers;
use crate::presentation::{print_json, print_separator, truncate_string};

fn print_entries(entries: &[CatalogEntry], as_json: bool) {
    if as_json {
        let rows: Vec<_> = entries
            .iter()
            .map(|e| {
                json!({
                    "server": e.server,
                    "category": e.category,
                    "tool": e.tool,
                })
            })
            .collect();
        print_json(&json!(rows));
        return;
    }

    println!("{:<20} {:<24} Description", "Server", "Tool");
    print_separator(90);
    for entry in entries {
        println!(
            "{:<20} {:<24} {}",
            truncate_string(&entry.server, 19),
            truncate_string(&entry.tool.name, 23),
            truncate_string(&entry.tool.description, 60)
        );
    }
}

/// Connect and list every tool, or only those of `server`.
pub async fn list(ctx: &CliContext, server: Option<&str>, as_json: bool) -> Result<()> {
    connect_servers(ctx, server).await?;
    let entries = match server {
        Some(name) => ctx.runtime.catalog().entries_for(name),
        None => ctx.runtime.tools(),
    };
    if entries.is_empty() && !as_json {
        println!("No tools available.");
        return Ok(());
    }
    print_entries(&entries, as_json);
    Ok(())
}

/// Connect everything and search tool names and descriptions.
pub async fn search(ctx: &CliContext, query: &str, as_json: bool) -> Result<()> {
    connect_servers(ctx, None).await?;
    let entries = ctx.runtime.search_tools(query);
    if entries.is_empty() && !as_json {
        println!("No tools match '{query}'.");
        return Ok(());
    }
    print_entries(&entries, as_json);
    Ok(())
}
