//! Servers command handler.

use anyhow::Result;
use serde_json::json;

use crate::bootstrap::CliContext;
use crate::presentation::{format_optional, print_json, print_separator, truncate_string};

/// List registered servers, optionally filtered by category.
pub async fn execute(ctx: &CliContext, category: Option<&str>, as_json: bool) -> Result<()> {
    let statuses: Vec<_> = ctx
        .runtime
        .status()
        .await
        .into_iter()
        .filter(|s| category.is_none_or(|c| s.category.eq_ignore_ascii_case(c)))
        .collect();

    if as_json {
        print_json(&json!(statuses));
        return Ok(());
    }

    if statuses.is_empty() {
        println!("No servers registered.");
        println!("Use 'toolmux templates' to see built-in servers, then 'toolmux add <template>'.");
        return Ok(());
    }

    println!(
        "{:<24} {:<12} {:<10} {:<14} Description",
        "Name", "Category", "Installed", "State"
    );
    print_separator(90);
    for status in statuses {
        println!(
            "{:<24} {:<12} {:<10} {:<14} {}",
            truncate_string(&status.name, 23),
            truncate_string(&status.category, 11),
            if status.installed { "yes" } else { "no" },
            status.connection.state.to_string(),
            format_optional(status.description.as_deref(), "--"),
        );
    }
    Ok(())
}
